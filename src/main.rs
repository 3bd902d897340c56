mod midwares;
mod quotes;
mod route_handlers;
mod search;
mod watchlist;

use std::{net::SocketAddr, path::Path, sync::Arc};
use axum::{middleware, routing::any, Extension, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use midwares::{app_state::Config, auth::signed_request_auth};
use quotes::provider::QuoteClient;
use route_handlers::sockets::ws_handler;
use search::{dataset, index::SearchIndex};
use watchlist::store::PgListStore;

#[tokio::main]
async fn main() {

  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with(fmt::layer())
    .init();

  let config = Arc::new(
    Config::from_env().unwrap_or_else(|err| panic!("incomplete configuration: {:?}", err)),
  );

  // the search index is built once from the static dataset and shared
  // read-only across every session
  let records = dataset::load_records(Path::new(&config.dataset_path))
    .unwrap_or_else(|err| panic!("failed to load company dataset: {}", err));
  let search_index = Arc::new(SearchIndex::build(&records));
  info!("search index ready over {} companies", records.len());

  let store = Arc::new(
    PgListStore::connect(&config.database_url)
      .await
      .unwrap_or_else(|err| panic!("failed to initialize watchlist store: {}", err)),
  );
  let quote_client = QuoteClient::new(&config.quote_api_url);

  let app = Router::new()
    .route("/wsboard", any(ws_handler))
    .layer(middleware::from_fn(signed_request_auth))
    .layer(Extension(Arc::clone(&config)))
    .layer(Extension(search_index))
    .layer(Extension(store))
    .layer(Extension(quote_client))
    .layer(CorsLayer::permissive());

  let listener = TcpListener::bind(&config.bind_addr)
    .await
    .expect("failed to start tcp listener");
  info!("listening on {}", config.bind_addr);

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .await
    .expect("failed to start server");
}
