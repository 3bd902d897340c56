use std::collections::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

/// The distinguished list every board carries. It cannot be deleted and
/// it is the only list monitored by add-ticker mode.
pub const DEFAULT_LIST: &str = "Holdings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DragKind {
  List,
  Item,
}

/// Column order plus per-list contents. Doubles as the wire snapshot and
/// as the deep copy taken at drag start.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoardState {
  pub columns: Vec<String>,
  pub items: HashMap<String, Vec<String>>,
}

/// Full-replace column ordering payload, 0-based positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPosition {
  pub name: String,
  pub position: i32,
}

/// A committed item drag. `from_list` is the list the gesture started
/// in, not wherever the item last hovered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemMove {
  pub from_list: String,
  pub to_list: String,
  pub ticker: String,
  pub new_position: i32,
}

#[derive(Debug, PartialEq)]
pub enum BoardError {
  EmptyListName,
  DuplicateList(String),
  UnknownList(String),
  UnknownTicker(String),
  NoActiveDrag,
  WrongDragKind,
}

impl std::fmt::Display for BoardError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::EmptyListName => {
        write!(f, "Watchlist name cannot be empty")
      },
      Self::DuplicateList(name) => {
        write!(f, "A watchlist named \"{}\" already exists", name)
      },
      Self::UnknownList(name) => {
        write!(f, "No watchlist named \"{}\"", name)
      },
      Self::UnknownTicker(ticker) => {
        write!(f, "Ticker {} is not on the board", ticker)
      },
      Self::NoActiveDrag => {
        write!(f, "No drag gesture in progress")
      },
      Self::WrongDragKind => {
        write!(f, "Drag gesture does not match the dragged entity")
      }
    }
  }
}

#[derive(Debug)]
enum DragState {
  List {
    snapshot: BoardState,
    name: String,
  },
  Item {
    snapshot: BoardState,
    ticker: String,
    source_list: String,
    current_list: String,
  },
}

/// Client-held board state. Every mutation here is local and synchronous;
/// persistence happens elsewhere, after the fact.
pub struct Board {
  columns: Vec<String>,
  items: HashMap<String, Vec<String>>,
  // multi-select delete mode, keyed by (list, ticker)
  selected: HashSet<(String, String)>,
  drag: Option<DragState>,
  // default-list contents captured when add-ticker mode was entered
  add_baseline: Option<Vec<String>>,
}

impl Board {
  pub fn from_state(state: BoardState) -> Self {
    Board {
      columns: state.columns,
      items: state.items,
      selected: HashSet::new(),
      drag: None,
      add_baseline: None,
    }
  }

  pub fn state(&self) -> BoardState {
    BoardState { columns: self.columns.clone(), items: self.items.clone() }
  }

  /// Make sure the default list exists. Used when a user shows up with
  /// nothing persisted yet.
  pub fn seed_default_list(&mut self) -> bool {
    if self.items.contains_key(DEFAULT_LIST) {
      return false;
    }
    self.columns.push(DEFAULT_LIST.to_string());
    self.items.insert(DEFAULT_LIST.to_string(), Vec::new());
    true
  }

  pub fn list_count(&self) -> usize {
    self.columns.len()
  }

  /// Append a new empty list. Returns the stored (trimmed) name and the
  /// position it landed at, for the persistence call.
  pub fn create_list(&mut self, name: &str) -> Result<(String, usize), BoardError> {
    let name = name.trim();
    if name.is_empty() {
      return Err(BoardError::EmptyListName);
    }
    if self.columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
      return Err(BoardError::DuplicateList(name.to_string()));
    }

    let position = self.columns.len();
    self.columns.push(name.to_string());
    self.items.insert(name.to_string(), Vec::new());
    Ok((name.to_string(), position))
  }

  /// Remove a list. The default list is untouchable; returns whether
  /// anything was removed.
  pub fn delete_list(&mut self, name: &str) -> bool {
    if name == DEFAULT_LIST {
      return false;
    }
    let Some(idx) = self.columns.iter().position(|c| c == name) else {
      return false;
    };
    self.columns.remove(idx);
    self.items.remove(name);
    self.selected.retain(|(list, _)| list != name);
    true
  }

  /// Toggle a ticker's membership in a list, comparing tickers
  /// case-insensitively. Returns true when the ticker was added.
  pub fn toggle_ticker(&mut self, list: &str, ticker: &str) -> Result<bool, BoardError> {
    let tickers = self
      .items
      .get_mut(list)
      .ok_or_else(|| BoardError::UnknownList(list.to_string()))?;

    if tickers.iter().any(|t| t.eq_ignore_ascii_case(ticker)) {
      tickers.retain(|t| !t.eq_ignore_ascii_case(ticker));
      Ok(false)
    } else {
      tickers.push(ticker.to_string());
      Ok(true)
    }
  }

  pub fn enter_add_mode(&mut self) {
    let baseline = self.items.get(DEFAULT_LIST).cloned().unwrap_or_default();
    self.add_baseline = Some(baseline);
  }

  /// Leave add-ticker mode and return the tickers that were added to the
  /// default list since the mode was entered.
  pub fn exit_add_mode(&mut self) -> Vec<String> {
    let Some(before) = self.add_baseline.take() else {
      return Vec::new();
    };
    let after = self.items.get(DEFAULT_LIST).cloned().unwrap_or_default();
    after.into_iter().filter(|t| !before.contains(t)).collect()
  }

  pub fn toggle_selection(&mut self, list: &str, ticker: &str) {
    let key = (list.to_string(), ticker.to_string());
    if !self.selected.remove(&key) {
      self.selected.insert(key);
    }
  }

  pub fn selected_count(&self) -> usize {
    self.selected.len()
  }

  pub fn clear_selection(&mut self) {
    self.selected.clear();
  }

  /// Drop every selected ticker from its list. Returns the removals
  /// grouped per list (board order, then list order) for persistence;
  /// the selection is cleared.
  pub fn delete_selected(&mut self) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for column in &self.columns {
      let Some(tickers) = self.items.get(column) else { continue };
      let picked: Vec<String> = tickers
        .iter()
        .filter(|t| self.selected.contains(&(column.clone(), (*t).clone())))
        .cloned()
        .collect();
      if !picked.is_empty() {
        groups.push((column.clone(), picked));
      }
    }

    for (column, removed) in &groups {
      if let Some(tickers) = self.items.get_mut(column) {
        tickers.retain(|t| !removed.contains(t));
      }
    }
    self.selected.clear();
    groups
  }

  pub fn active_drag(&self) -> Option<DragKind> {
    match self.drag {
      Some(DragState::List { .. }) => Some(DragKind::List),
      Some(DragState::Item { .. }) => Some(DragKind::Item),
      None => None,
    }
  }

  pub fn drag_start_list(&mut self, name: &str) -> Result<(), BoardError> {
    if !self.columns.iter().any(|c| c == name) {
      return Err(BoardError::UnknownList(name.to_string()));
    }
    self.drag = Some(DragState::List { snapshot: self.state(), name: name.to_string() });
    Ok(())
  }

  pub fn drag_start_item(&mut self, list: &str, ticker: &str) -> Result<(), BoardError> {
    let tickers = self
      .items
      .get(list)
      .ok_or_else(|| BoardError::UnknownList(list.to_string()))?;
    if !tickers.iter().any(|t| t == ticker) {
      return Err(BoardError::UnknownTicker(ticker.to_string()));
    }

    self.drag = Some(DragState::Item {
      snapshot: self.state(),
      ticker: ticker.to_string(),
      source_list: list.to_string(),
      current_list: list.to_string(),
    });
    Ok(())
  }

  /// Track the pointer: relocate the dragged item right away so the
  /// board mirrors the hover position. No persistence is involved.
  pub fn drag_over_item(&mut self, to_list: &str, to_index: usize) -> Result<(), BoardError> {
    let (ticker, from) = match &self.drag {
      Some(DragState::Item { ticker, current_list, .. }) => (ticker.clone(), current_list.clone()),
      Some(DragState::List { .. }) => return Err(BoardError::WrongDragKind),
      None => return Err(BoardError::NoActiveDrag),
    };
    if !self.items.contains_key(to_list) {
      return Err(BoardError::UnknownList(to_list.to_string()));
    }

    let source = self
      .items
      .get_mut(&from)
      .ok_or_else(|| BoardError::UnknownList(from.clone()))?;
    let Some(idx) = source.iter().position(|t| t == &ticker) else {
      return Err(BoardError::UnknownTicker(ticker));
    };
    source.remove(idx);

    let dest = self
      .items
      .get_mut(to_list)
      .ok_or_else(|| BoardError::UnknownList(to_list.to_string()))?;
    let insert_at = to_index.min(dest.len());
    dest.insert(insert_at, ticker);

    if let Some(DragState::Item { current_list, .. }) = &mut self.drag {
      *current_list = to_list.to_string();
    }
    Ok(())
  }

  /// Commit an item drag: clears the gesture and reports the single move
  /// to persist, keyed on the gesture's original source list.
  pub fn drag_end_item(&mut self) -> Result<ItemMove, BoardError> {
    match self.drag.take() {
      Some(DragState::Item { ticker, source_list, current_list, .. }) => {
        let position = self
          .items
          .get(&current_list)
          .and_then(|tickers| tickers.iter().position(|t| t == &ticker))
          .ok_or_else(|| BoardError::UnknownTicker(ticker.clone()))?;

        Ok(ItemMove {
          from_list: source_list,
          to_list: current_list,
          ticker,
          new_position: position as i32,
        })
      },
      Some(drag @ DragState::List { .. }) => {
        self.drag = Some(drag);
        Err(BoardError::WrongDragKind)
      },
      None => Err(BoardError::NoActiveDrag),
    }
  }

  /// Commit a list drag: apply the new column order and report the full
  /// ordering (not a delta) to persist.
  pub fn drag_end_list(&mut self, to_index: usize) -> Result<Vec<ListPosition>, BoardError> {
    match self.drag.take() {
      Some(DragState::List { name, .. }) => {
        let Some(idx) = self.columns.iter().position(|c| c == &name) else {
          return Err(BoardError::UnknownList(name));
        };
        let column = self.columns.remove(idx);
        let insert_at = to_index.min(self.columns.len());
        self.columns.insert(insert_at, column);

        Ok(
          self
            .columns
            .iter()
            .enumerate()
            .map(|(position, name)| ListPosition { name: name.clone(), position: position as i32 })
            .collect(),
        )
      },
      Some(drag @ DragState::Item { .. }) => {
        self.drag = Some(drag);
        Err(BoardError::WrongDragKind)
      },
      None => Err(BoardError::NoActiveDrag),
    }
  }

  /// Abandon the gesture and put the board back exactly as it was when
  /// the drag started. Purely local.
  pub fn drag_cancel(&mut self) -> bool {
    let Some(drag) = self.drag.take() else {
      return false;
    };
    let snapshot = match drag {
      DragState::List { snapshot, .. } => snapshot,
      DragState::Item { snapshot, .. } => snapshot,
    };
    self.columns = snapshot.columns;
    self.items = snapshot.items;
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn board(columns: &[(&str, &[&str])]) -> Board {
    let mut state = BoardState::default();
    for (name, tickers) in columns {
      state.columns.push(name.to_string());
      state
        .items
        .insert(name.to_string(), tickers.iter().map(|t| t.to_string()).collect());
    }
    Board::from_state(state)
  }

  #[test]
  fn default_list_survives_every_delete_attempt() {
    let mut b = board(&[(DEFAULT_LIST, &["AAPL"]), ("Tech", &["NVDA"])]);
    assert!(!b.delete_list(DEFAULT_LIST));
    assert!(b.delete_list("Tech"));
    assert!(!b.delete_list(DEFAULT_LIST));
    assert!(b.state().items.contains_key(DEFAULT_LIST));
  }

  #[test]
  fn create_list_validates_before_mutating() {
    let mut b = board(&[(DEFAULT_LIST, &[])]);
    assert_eq!(b.create_list("   "), Err(BoardError::EmptyListName));

    let (name, position) = b.create_list("  Tech  ").unwrap();
    assert_eq!((name.as_str(), position), ("Tech", 1));

    // duplicate check is case-insensitive and leaves the board alone
    assert_eq!(b.create_list("tech"), Err(BoardError::DuplicateList("tech".to_string())));
    assert_eq!(b.list_count(), 2);
  }

  #[test]
  fn toggle_is_a_true_toggle() {
    let mut b = board(&[(DEFAULT_LIST, &["AAPL"])]);
    let original = b.state();

    // absent -> added -> absent again
    assert_eq!(b.toggle_ticker(DEFAULT_LIST, "TSLA"), Ok(true));
    assert_eq!(b.toggle_ticker(DEFAULT_LIST, "TSLA"), Ok(false));
    assert_eq!(b.state(), original);

    // present -> removed -> present again, case-insensitively
    assert_eq!(b.toggle_ticker(DEFAULT_LIST, "aapl"), Ok(false));
    assert_eq!(b.toggle_ticker(DEFAULT_LIST, "aapl"), Ok(true));
    assert_eq!(b.state().items[DEFAULT_LIST], vec!["aapl"]);
  }

  #[test]
  fn toggle_unknown_list_is_an_error() {
    let mut b = board(&[(DEFAULT_LIST, &[])]);
    assert_eq!(
      b.toggle_ticker("Nope", "AAPL"),
      Err(BoardError::UnknownList("Nope".to_string()))
    );
  }

  #[test]
  fn canceled_drag_restores_the_board_verbatim() {
    let mut b = board(&[
      (DEFAULT_LIST, &["AAPL", "MSFT"]),
      ("Tech", &["NVDA", "AMD"]),
    ]);
    let before = b.state();

    b.drag_start_item(DEFAULT_LIST, "AAPL").unwrap();
    b.drag_over_item("Tech", 0).unwrap();
    b.drag_over_item("Tech", 2).unwrap();
    b.drag_over_item(DEFAULT_LIST, 1).unwrap();
    assert_ne!(b.state(), before);

    assert!(b.drag_cancel());
    assert_eq!(b.state(), before);
    assert_eq!(b.active_drag(), None);
  }

  #[test]
  fn canceled_list_drag_restores_column_order() {
    let mut b = board(&[(DEFAULT_LIST, &[]), ("A", &[]), ("B", &[])]);
    let before = b.state();

    b.drag_start_list("B").unwrap();
    assert!(b.drag_cancel());
    assert_eq!(b.state(), before);
  }

  #[test]
  fn item_commit_reports_the_gesture_source_not_the_last_hover() {
    let mut b = board(&[
      ("A", &["AAPL", "MSFT"]),
      ("B", &["NVDA"]),
      ("C", &[]),
    ]);

    b.drag_start_item("A", "AAPL").unwrap();
    b.drag_over_item("B", 0).unwrap();
    b.drag_over_item("C", 0).unwrap();
    let mv = b.drag_end_item().unwrap();

    assert_eq!(
      mv,
      ItemMove {
        from_list: "A".to_string(),
        to_list: "C".to_string(),
        ticker: "AAPL".to_string(),
        new_position: 0,
      }
    );
    assert_eq!(b.state().items["A"], vec!["MSFT"]);
    assert_eq!(b.state().items["C"], vec!["AAPL"]);
    assert_eq!(b.active_drag(), None);
  }

  #[test]
  fn reorder_within_one_list_keeps_source_and_destination_equal() {
    let mut b = board(&[("A", &["AAPL", "MSFT", "NVDA"])]);

    b.drag_start_item("A", "NVDA").unwrap();
    b.drag_over_item("A", 0).unwrap();
    let mv = b.drag_end_item().unwrap();

    assert_eq!(mv.from_list, "A");
    assert_eq!(mv.to_list, "A");
    assert_eq!(mv.new_position, 0);
    assert_eq!(b.state().items["A"], vec!["NVDA", "AAPL", "MSFT"]);
  }

  #[test]
  fn list_commit_reports_the_full_new_ordering() {
    let mut b = board(&[("A", &[]), ("B", &[]), ("C", &[])]);

    b.drag_start_list("C").unwrap();
    let order = b.drag_end_list(0).unwrap();

    assert_eq!(
      order,
      vec![
        ListPosition { name: "C".to_string(), position: 0 },
        ListPosition { name: "A".to_string(), position: 1 },
        ListPosition { name: "B".to_string(), position: 2 },
      ]
    );
    assert_eq!(b.state().columns, vec!["C", "A", "B"]);
  }

  #[test]
  fn drag_over_past_the_end_clamps_to_the_list_tail() {
    let mut b = board(&[("A", &["AAPL"]), ("B", &["MSFT"])]);
    b.drag_start_item("A", "AAPL").unwrap();
    b.drag_over_item("B", 99).unwrap();
    assert_eq!(b.state().items["B"], vec!["MSFT", "AAPL"]);
  }

  #[test]
  fn add_mode_diff_only_reports_new_tickers() {
    let mut b = board(&[(DEFAULT_LIST, &["AAPL", "MSFT"])]);

    b.enter_add_mode();
    b.toggle_ticker(DEFAULT_LIST, "TSLA").unwrap();
    b.toggle_ticker(DEFAULT_LIST, "NVDA").unwrap();
    b.toggle_ticker(DEFAULT_LIST, "NVDA").unwrap(); // toggled back off
    b.toggle_ticker(DEFAULT_LIST, "MSFT").unwrap(); // removed, not added

    assert_eq!(b.exit_add_mode(), vec!["TSLA"]);
    // a second exit without entering reports nothing
    assert!(b.exit_add_mode().is_empty());
  }

  #[test]
  fn delete_selected_groups_by_list_and_clears_the_selection() {
    let mut b = board(&[
      (DEFAULT_LIST, &["AAPL", "MSFT"]),
      ("Tech", &["NVDA", "AMD"]),
    ]);

    b.toggle_selection(DEFAULT_LIST, "AAPL");
    b.toggle_selection("Tech", "NVDA");
    b.toggle_selection("Tech", "AMD");
    b.toggle_selection("Tech", "AMD"); // deselected again
    assert_eq!(b.selected_count(), 2);

    let groups = b.delete_selected();
    assert_eq!(
      groups,
      vec![
        (DEFAULT_LIST.to_string(), vec!["AAPL".to_string()]),
        ("Tech".to_string(), vec!["NVDA".to_string()]),
      ]
    );
    assert_eq!(b.state().items[DEFAULT_LIST], vec!["MSFT"]);
    assert_eq!(b.state().items["Tech"], vec!["AMD"]);
    assert_eq!(b.selected_count(), 0);
  }

  #[test]
  fn deleting_a_list_drops_its_selections() {
    let mut b = board(&[(DEFAULT_LIST, &["AAPL"]), ("Tech", &["NVDA"])]);
    b.toggle_selection("Tech", "NVDA");
    b.delete_list("Tech");
    assert_eq!(b.selected_count(), 0);
    assert!(b.delete_selected().is_empty());
  }

  #[test]
  fn seeding_only_fires_on_an_empty_board() {
    let mut b = Board::from_state(BoardState::default());
    assert!(b.seed_default_list());
    assert!(!b.seed_default_list());
    assert_eq!(b.state().columns, vec![DEFAULT_LIST]);
  }
}
