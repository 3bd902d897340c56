use std::{future::Future, sync::Arc};
use tracing::error;

use super::board::{Board, BoardError, BoardState, DragKind, DEFAULT_LIST};
use super::store::{ListStore, StoreError};

// Persistence is fire-and-forget: the board has already moved on, so a
// failed write is logged for the operator and otherwise dropped. No
// retry, no rollback.
fn persist<F>(what: &'static str, fut: F)
where
  F: Future<Output = Result<(), StoreError>> + Send + 'static,
{
  tokio::spawn(async move {
    if let Err(err) = fut.await {
      error!("failed to persist {}: {}", what, err);
    }
  });
}

/// One user's board session: local state is mutated synchronously, in
/// gesture order, and every mutation that needs durability spawns its
/// store call afterwards. Nothing here ever waits on the store.
pub struct Reconciler<S: ListStore> {
  board: Board,
  store: Arc<S>,
  user_id: String,
}

impl<S: ListStore> Reconciler<S> {
  /// Load the persisted board. A user with nothing persisted gets the
  /// default list seeded locally and written through; a failed load
  /// falls back to a bare default board without writing anything.
  pub async fn load(user_id: String, store: Arc<S>) -> Self {
    let board = match store.load_board(user_id.clone()).await {
      Ok(state) => {
        let mut board = Board::from_state(state);
        if board.seed_default_list() {
          let store = Arc::clone(&store);
          let user = user_id.clone();
          persist("default watchlist", async move {
            store.ensure_default_list(user).await
          });
        }
        board
      },
      Err(err) => {
        error!("failed to load watchlists for {}: {}", user_id, err);
        let mut board = Board::from_state(BoardState::default());
        board.seed_default_list();
        board
      }
    };

    Reconciler { board, store, user_id }
  }

  pub fn state(&self) -> BoardState {
    self.board.state()
  }

  pub fn create_list(&mut self, name: &str) -> Result<(), BoardError> {
    let (name, position) = self.board.create_list(name)?;

    let store = Arc::clone(&self.store);
    let user = self.user_id.clone();
    persist("new watchlist", async move {
      store.create_list(user, name, position as i32).await
    });
    Ok(())
  }

  pub fn delete_list(&mut self, name: &str) {
    if !self.board.delete_list(name) {
      return;
    }

    let store = Arc::clone(&self.store);
    let user = self.user_id.clone();
    let name = name.to_string();
    persist("watchlist removal", async move {
      store.delete_list(user, name).await
    });
  }

  /// Pure local toggle; durability for the default list comes later via
  /// the add-mode batch commit.
  pub fn toggle_ticker(&mut self, list: &str, ticker: &str) -> Result<bool, BoardError> {
    self.board.toggle_ticker(list, ticker)
  }

  pub fn enter_add_mode(&mut self) {
    self.board.enter_add_mode();
  }

  /// Leave add-ticker mode: whatever is new on the default list since
  /// entry goes out as one batched add.
  pub fn exit_add_mode(&mut self) {
    let added = self.board.exit_add_mode();
    if added.is_empty() {
      return;
    }

    let store = Arc::clone(&self.store);
    let user = self.user_id.clone();
    persist("batched ticker additions", async move {
      store.add_items(user, DEFAULT_LIST.to_string(), added).await
    });
  }

  pub fn toggle_selection(&mut self, list: &str, ticker: &str) {
    self.board.toggle_selection(list, ticker);
  }

  pub fn clear_selection(&mut self) {
    self.board.clear_selection();
  }

  /// Remove everything selected, one store call per affected list.
  pub fn delete_selected(&mut self) {
    for (list, tickers) in self.board.delete_selected() {
      let store = Arc::clone(&self.store);
      let user = self.user_id.clone();
      persist("selected ticker removals", async move {
        store.delete_items(user, list, tickers).await
      });
    }
  }

  pub fn active_drag(&self) -> Option<DragKind> {
    self.board.active_drag()
  }

  pub fn drag_start_list(&mut self, name: &str) -> Result<(), BoardError> {
    self.board.drag_start_list(name)
  }

  pub fn drag_start_item(&mut self, list: &str, ticker: &str) -> Result<(), BoardError> {
    self.board.drag_start_item(list, ticker)
  }

  pub fn drag_over_item(&mut self, to_list: &str, to_index: usize) -> Result<(), BoardError> {
    self.board.drag_over_item(to_list, to_index)
  }

  pub fn drag_end_item(&mut self) -> Result<(), BoardError> {
    let mv = self.board.drag_end_item()?;

    let store = Arc::clone(&self.store);
    let user = self.user_id.clone();
    persist("item move", async move { store.move_item(user, mv).await });
    Ok(())
  }

  pub fn drag_end_list(&mut self, to_index: usize) -> Result<(), BoardError> {
    let order = self.board.drag_end_list(to_index)?;

    let store = Arc::clone(&self.store);
    let user = self.user_id.clone();
    persist("watchlist ordering", async move {
      store.replace_list_order(user, order).await
    });
    Ok(())
  }

  /// Rollback is local and synchronous; the store never hears about a
  /// canceled gesture.
  pub fn drag_cancel(&mut self) -> bool {
    self.board.drag_cancel()
  }
}
