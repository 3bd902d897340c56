use std::{fmt, future::Future};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::info;

use super::board::{BoardState, ItemMove, ListPosition, DEFAULT_LIST};

#[derive(Debug)]
pub enum StoreError {
  // raised by the reindexing procedures when a list (or the moved
  // ticker) is gone server-side
  NotFound(String),
  Database(sqlx::Error),
}

impl fmt::Display for StoreError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NotFound(what) => {
        write!(f, "{} does not exist in the store", what)
      },
      Self::Database(err) => {
        write!(f, "Store operation failed: {}", err)
      }
    }
  }
}

impl From<sqlx::Error> for StoreError {
  fn from(value: sqlx::Error) -> Self {
    StoreError::Database(value)
  }
}

// The procedures signal a missing list/ticker with ERRCODE P0002
// (no_data_found); everything else stays a plain database error.
fn classify(what: &str, err: sqlx::Error) -> StoreError {
  let not_found = err
    .as_database_error()
    .and_then(|db| db.code())
    .map(|code| code == "P0002")
    .unwrap_or(false);

  if not_found {
    StoreError::NotFound(what.to_string())
  } else {
    StoreError::Database(err)
  }
}

/// Durability side of the board. Implementations are expected to keep
/// item positions dense and 0-based after every mutation; callers never
/// renumber for them.
pub trait ListStore: Send + Sync + 'static {
  fn load_board(&self, user_id: String) -> impl Future<Output = Result<BoardState, StoreError>> + Send;
  fn ensure_default_list(&self, user_id: String) -> impl Future<Output = Result<(), StoreError>> + Send;
  fn create_list(&self, user_id: String, name: String, position: i32) -> impl Future<Output = Result<(), StoreError>> + Send;
  fn delete_list(&self, user_id: String, name: String) -> impl Future<Output = Result<(), StoreError>> + Send;
  fn replace_list_order(&self, user_id: String, order: Vec<ListPosition>) -> impl Future<Output = Result<(), StoreError>> + Send;
  fn add_items(&self, user_id: String, list: String, tickers: Vec<String>) -> impl Future<Output = Result<(), StoreError>> + Send;
  fn delete_items(&self, user_id: String, list: String, tickers: Vec<String>) -> impl Future<Output = Result<(), StoreError>> + Send;
  fn move_item(&self, user_id: String, mv: ItemMove) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// Schema plus the three server-side procedures. Each procedure mutates
// and renumbers inside one function call, so positions stay dense no
// matter how calls interleave.
const SCHEMA: &str = "
  CREATE TABLE IF NOT EXISTS watchlists (
    id SERIAL PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    is_default BOOLEAN NOT NULL DEFAULT FALSE,
    position INT NOT NULL DEFAULT 0,
    UNIQUE(user_id, name)
  );

  CREATE TABLE IF NOT EXISTS watchlist_items (
    id SERIAL PRIMARY KEY,
    watchlist_id INT NOT NULL REFERENCES watchlists(id) ON DELETE CASCADE,
    ticker TEXT NOT NULL,
    position INT NOT NULL DEFAULT 0
  );

  CREATE OR REPLACE FUNCTION watchlist_add_items(p_user TEXT, p_list TEXT, p_tickers TEXT[])
  RETURNS VOID AS $$
  DECLARE
    v_list INT;
    v_next INT;
    v_ticker TEXT;
  BEGIN
    SELECT id INTO v_list FROM watchlists WHERE user_id = p_user AND name = p_list;
    IF v_list IS NULL THEN
      RAISE EXCEPTION 'watchlist % not found', p_list USING ERRCODE = 'P0002';
    END IF;

    SELECT COUNT(*) INTO v_next FROM watchlist_items WHERE watchlist_id = v_list;
    FOREACH v_ticker IN ARRAY p_tickers LOOP
      INSERT INTO watchlist_items (watchlist_id, ticker, position)
      VALUES (v_list, v_ticker, v_next);
      v_next := v_next + 1;
    END LOOP;
  END;
  $$ LANGUAGE plpgsql;

  CREATE OR REPLACE FUNCTION watchlist_delete_items(p_user TEXT, p_list TEXT, p_tickers TEXT[])
  RETURNS VOID AS $$
  DECLARE
    v_list INT;
  BEGIN
    SELECT id INTO v_list FROM watchlists WHERE user_id = p_user AND name = p_list;
    IF v_list IS NULL THEN
      RAISE EXCEPTION 'watchlist % not found', p_list USING ERRCODE = 'P0002';
    END IF;

    DELETE FROM watchlist_items WHERE watchlist_id = v_list AND ticker = ANY(p_tickers);

    WITH renumbered AS (
      SELECT id, ROW_NUMBER() OVER (ORDER BY position, id) - 1 AS pos
      FROM watchlist_items WHERE watchlist_id = v_list
    )
    UPDATE watchlist_items w SET position = r.pos FROM renumbered r WHERE w.id = r.id;
  END;
  $$ LANGUAGE plpgsql;

  CREATE OR REPLACE FUNCTION watchlist_move_item(p_user TEXT, p_from TEXT, p_to TEXT, p_ticker TEXT, p_position INT)
  RETURNS VOID AS $$
  DECLARE
    v_from INT;
    v_to INT;
    v_row INT;
  BEGIN
    SELECT id INTO v_from FROM watchlists WHERE user_id = p_user AND name = p_from;
    IF v_from IS NULL THEN
      RAISE EXCEPTION 'watchlist % not found', p_from USING ERRCODE = 'P0002';
    END IF;
    SELECT id INTO v_to FROM watchlists WHERE user_id = p_user AND name = p_to;
    IF v_to IS NULL THEN
      RAISE EXCEPTION 'watchlist % not found', p_to USING ERRCODE = 'P0002';
    END IF;

    SELECT id INTO v_row FROM watchlist_items
    WHERE watchlist_id = v_from AND ticker = p_ticker
    ORDER BY position LIMIT 1;
    IF v_row IS NULL THEN
      RAISE EXCEPTION 'ticker % not in watchlist %', p_ticker, p_from USING ERRCODE = 'P0002';
    END IF;

    DELETE FROM watchlist_items WHERE id = v_row;
    UPDATE watchlist_items SET position = position + 1
    WHERE watchlist_id = v_to AND position >= p_position;
    INSERT INTO watchlist_items (watchlist_id, ticker, position)
    VALUES (v_to, p_ticker, p_position);

    WITH renumbered AS (
      SELECT id, ROW_NUMBER() OVER (ORDER BY position, id) - 1 AS pos
      FROM watchlist_items WHERE watchlist_id = v_from
    )
    UPDATE watchlist_items w SET position = r.pos FROM renumbered r WHERE w.id = r.id;

    WITH renumbered AS (
      SELECT id, ROW_NUMBER() OVER (ORDER BY position, id) - 1 AS pos
      FROM watchlist_items WHERE watchlist_id = v_to
    )
    UPDATE watchlist_items w SET position = r.pos FROM renumbered r WHERE w.id = r.id;
  END;
  $$ LANGUAGE plpgsql;
";

#[derive(Clone)]
pub struct PgListStore {
  pool: PgPool,
}

impl PgListStore {
  pub async fn connect(db_url: &str) -> Result<Self, StoreError> {
    info!("Postgres pool initializing..");

    let pool = PgPoolOptions::new()
      .max_connections(8)
      .connect(db_url)
      .await?;

    sqlx::raw_sql(SCHEMA).execute(&pool).await?;
    info!("watchlist schema ready");

    Ok(Self { pool })
  }
}

impl ListStore for PgListStore {
  async fn load_board(&self, user_id: String) -> Result<BoardState, StoreError> {
    let rows = sqlx::query(
      "SELECT w.name, i.ticker FROM watchlists w \
       LEFT JOIN watchlist_items i ON i.watchlist_id = w.id \
       WHERE w.user_id = $1 \
       ORDER BY w.position, w.id, i.position, i.id",
    )
    .bind(&user_id)
    .fetch_all(&self.pool)
    .await?;

    let mut state = BoardState::default();
    for row in rows {
      let name: String = row.get("name");
      let ticker: Option<String> = row.get("ticker");

      if !state.items.contains_key(&name) {
        state.columns.push(name.clone());
        state.items.insert(name.clone(), Vec::new());
      }
      if let (Some(ticker), Some(tickers)) = (ticker, state.items.get_mut(&name)) {
        tickers.push(ticker);
      }
    }
    Ok(state)
  }

  async fn ensure_default_list(&self, user_id: String) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO watchlists (user_id, name, is_default, position) \
       VALUES ($1, $2, TRUE, 0) ON CONFLICT (user_id, name) DO NOTHING",
    )
    .bind(&user_id)
    .bind(DEFAULT_LIST)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn create_list(&self, user_id: String, name: String, position: i32) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO watchlists (user_id, name, is_default, position) VALUES ($1, $2, FALSE, $3)",
    )
    .bind(&user_id)
    .bind(&name)
    .bind(position)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn delete_list(&self, user_id: String, name: String) -> Result<(), StoreError> {
    // items go with it via ON DELETE CASCADE
    sqlx::query("DELETE FROM watchlists WHERE user_id = $1 AND name = $2")
      .bind(&user_id)
      .bind(&name)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn replace_list_order(&self, user_id: String, order: Vec<ListPosition>) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await?;
    for ListPosition { name, position } in &order {
      sqlx::query("UPDATE watchlists SET position = $3 WHERE user_id = $1 AND name = $2")
        .bind(&user_id)
        .bind(name)
        .bind(position)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
  }

  async fn add_items(&self, user_id: String, list: String, tickers: Vec<String>) -> Result<(), StoreError> {
    sqlx::query("SELECT watchlist_add_items($1, $2, $3)")
      .bind(&user_id)
      .bind(&list)
      .bind(&tickers)
      .execute(&self.pool)
      .await
      .map_err(|err| classify(&list, err))?;
    Ok(())
  }

  async fn delete_items(&self, user_id: String, list: String, tickers: Vec<String>) -> Result<(), StoreError> {
    sqlx::query("SELECT watchlist_delete_items($1, $2, $3)")
      .bind(&user_id)
      .bind(&list)
      .bind(&tickers)
      .execute(&self.pool)
      .await
      .map_err(|err| classify(&list, err))?;
    Ok(())
  }

  async fn move_item(&self, user_id: String, mv: ItemMove) -> Result<(), StoreError> {
    sqlx::query("SELECT watchlist_move_item($1, $2, $3, $4, $5)")
      .bind(&user_id)
      .bind(&mv.from_list)
      .bind(&mv.to_list)
      .bind(&mv.ticker)
      .bind(mv.new_position)
      .execute(&self.pool)
      .await
      .map_err(|err| classify(&mv.ticker, err))?;
    Ok(())
  }
}
