use std::{collections::HashMap, io::Write, sync::Arc};
use axum::{
  extract::{ws::{Message, WebSocket}, WebSocketUpgrade}, response::IntoResponse, Extension
};
use flate2::{write::DeflateEncoder, Compression};
use futures::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::midwares::app_state::RequestContext;
use crate::quotes::kpi::{kpi_values, KpiValue};
use crate::quotes::provider::{QuoteClient, QuoteData};
use crate::search::index::{SearchIndex, TickerRecord};
use crate::watchlist::board::{BoardError, BoardState, DragKind};
use crate::watchlist::reconciler::Reconciler;
use crate::watchlist::store::PgListStore;

const SUGGESTION_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WsRequest {
  Search { term: String },
  Quotes { tickers: Vec<String> },
  Summary { ticker: String },
  CreateList { name: String },
  DeleteList { name: String },
  ToggleTicker { list: String, ticker: String },
  EnterAddMode,
  ExitAddMode,
  ToggleSelect { list: String, ticker: String },
  ClearSelection,
  DeleteSelected,
  DragStart { kind: DragKind, list: String, ticker: Option<String> },
  DragOver { to_list: String, to_index: usize },
  DragEnd { to_index: Option<usize> },
  DragCancel,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum WsResponse {
  Snapshot { columns: Vec<String>, items: HashMap<String, Vec<String>> },
  Suggestions { term: String, matches: Vec<TickerRecord> },
  Quotes { quotes: HashMap<String, QuoteData> },
  Kpis { ticker: String, kpis: Vec<KpiValue> },
  InvalidList { message: String },
}

fn snapshot(state: BoardState) -> WsResponse {
  WsResponse::Snapshot { columns: state.columns, items: state.items }
}

pub async fn ws_handler(
  ws: WebSocketUpgrade,
  Extension(index): Extension<Arc<SearchIndex>>,
  Extension(store): Extension<Arc<PgListStore>>,
  Extension(quotes): Extension<QuoteClient>,
  Extension(ctx): Extension<RequestContext>,
) -> impl IntoResponse {

  let RequestContext { user_id, remote_ip, timestamp, signature } = ctx;
  info!("user {} connected from {}", user_id, remote_ip);

  // echo the credential subprotocols so the browser accepts the upgrade
  ws.protocols([timestamp, signature])
    .on_upgrade(move |socket| handle_socket(socket, index, store, quotes, user_id))
}

async fn handle_socket(
  socket: WebSocket,
  index: Arc<SearchIndex>,
  store: Arc<PgListStore>,
  quotes: QuoteClient,
  user_id: String,
) {

  let (mut sender, mut receiver) = socket.split();
  // async work (quote fetches) funnels its responses through here
  let (tx, mut rx) = mpsc::channel::<WsResponse>(256);

  let mut session = Reconciler::load(user_id.clone(), store).await;

  // persisted state is the source of truth on (re)load
  if send_response(&mut sender, snapshot(session.state())).await.is_err() {
    return;
  }

  loop {
    tokio::select! {
      msg = receiver.next() => {
        let Some(Ok(client_msg)) = msg else { break };
        match client_msg {
          Message::Text(t) => {
            let request = match serde_json::from_str::<WsRequest>(t.as_str()) {
              Ok(request) => request,
              Err(err) => {
                warn!("unparseable message from {}: {}", user_id, err);
                continue;
              }
            };

            if let Some(reply) = dispatch(request, &mut session, &index, &quotes, &tx) {
              if send_response(&mut sender, reply).await.is_err() {
                break;
              }
            }
          },
          Message::Close(_) => {
            info!("user {} closed the board", user_id);
            break;
          },
          _ => {}
        }
      }

      Some(response) = rx.recv() => {
        if send_response(&mut sender, response).await.is_err() {
          break;
        }
      }
    }
  }

  info!("board session over for {}", user_id);
}

// Board mutations run inline so gestures apply in arrival order; their
// persistence is spawned inside the session. Provider round-trips are
// spawned here and come back through the channel.
fn dispatch(
  request: WsRequest,
  session: &mut Reconciler<PgListStore>,
  index: &SearchIndex,
  quotes: &QuoteClient,
  tx: &mpsc::Sender<WsResponse>,
) -> Option<WsResponse> {
  match request {
    WsRequest::Search { term } => {
      let matches = index.suggestions(&term, SUGGESTION_LIMIT);
      Some(WsResponse::Suggestions { term, matches })
    },

    WsRequest::Quotes { tickers } => {
      let client = quotes.clone();
      let tx = tx.clone();
      tokio::spawn(async move {
        let quotes = client.fetch_quotes(&tickers).await;
        if tx.send(WsResponse::Quotes { quotes }).await.is_err() {
          warn!("board session ended before quotes arrived");
        }
      });
      None
    },

    WsRequest::Summary { ticker } => {
      let client = quotes.clone();
      let tx = tx.clone();
      tokio::spawn(async move {
        let summary = client.fetch_summary(&ticker).await.unwrap_or_default();
        let kpis = kpi_values(&summary);
        if tx.send(WsResponse::Kpis { ticker, kpis }).await.is_err() {
          warn!("board session ended before the summary arrived");
        }
      });
      None
    },

    WsRequest::CreateList { name } => match session.create_list(&name) {
      Ok(()) => None,
      // a blank name is dropped without comment, a duplicate gets a
      // visible validation message; neither touches the store
      Err(BoardError::EmptyListName) => None,
      Err(err @ BoardError::DuplicateList(_)) => {
        Some(WsResponse::InvalidList { message: err.to_string() })
      },
      Err(err) => {
        warn!("watchlist create rejected: {}", err);
        None
      }
    },

    WsRequest::DeleteList { name } => {
      session.delete_list(&name);
      None
    },

    WsRequest::ToggleTicker { list, ticker } => {
      if let Err(err) = session.toggle_ticker(&list, &ticker) {
        warn!("ticker toggle ignored: {}", err);
      }
      None
    },

    WsRequest::EnterAddMode => {
      session.enter_add_mode();
      None
    },

    WsRequest::ExitAddMode => {
      session.exit_add_mode();
      None
    },

    WsRequest::ToggleSelect { list, ticker } => {
      session.toggle_selection(&list, &ticker);
      None
    },

    WsRequest::ClearSelection => {
      session.clear_selection();
      None
    },

    WsRequest::DeleteSelected => {
      session.delete_selected();
      None
    },

    WsRequest::DragStart { kind, list, ticker } => {
      let result = match (kind, ticker) {
        (DragKind::List, _) => session.drag_start_list(&list),
        (DragKind::Item, Some(ticker)) => session.drag_start_item(&list, &ticker),
        (DragKind::Item, None) => {
          warn!("item drag start without a ticker");
          return None;
        }
      };
      if let Err(err) = result {
        warn!("drag start ignored: {}", err);
      }
      None
    },

    WsRequest::DragOver { to_list, to_index } => {
      if let Err(err) = session.drag_over_item(&to_list, to_index) {
        warn!("drag over ignored: {}", err);
      }
      None
    },

    WsRequest::DragEnd { to_index } => {
      let result = match session.active_drag() {
        Some(DragKind::Item) => session.drag_end_item(),
        Some(DragKind::List) => match to_index {
          Some(to_index) => session.drag_end_list(to_index),
          None => {
            // a release we cannot place is treated as a cancel
            warn!("list drag release without a position");
            session.drag_cancel();
            Ok(())
          }
        },
        None => {
          warn!("drag release with no active gesture");
          Ok(())
        }
      };
      if let Err(err) = result {
        warn!("drag commit failed: {}", err);
      }
      None
    },

    WsRequest::DragCancel => {
      session.drag_cancel();
      None
    },
  }
}

// helper function to compress data
fn compress_data(data: &str) -> std::io::Result<Vec<u8>> {
  let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
  encoder.write_all(data.as_bytes())?;
  encoder.finish()
}

async fn send_response(
  sender: &mut SplitSink<WebSocket, Message>,
  response: WsResponse,
) -> Result<(), axum::Error> {
  let json = match serde_json::to_string(&response) {
    Ok(json) => json,
    Err(err) => {
      warn!("failed to serialize ws response: {}", err);
      return Ok(());
    }
  };

  // validation messages are tiny; everything else is worth deflating
  let msg = if matches!(response, WsResponse::InvalidList { .. }) {
    Message::text(json)
  } else {
    match compress_data(&json) {
      Ok(compressed) => Message::binary(compressed),
      Err(err) => {
        warn!("failed to compress ws frame: {}", err);
        Message::text(json)
      }
    }
  };

  sender.send(msg).await
}
