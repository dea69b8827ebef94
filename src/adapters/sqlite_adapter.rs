//! SQLite profile store.
//!
//! A user document is spread over `users`, `holdings` and `transactions`;
//! saves rewrite the child rows inside one transaction guarded by the
//! `users.version` column.

use crate::domain::config_validation::store_settings;
use crate::domain::deposit::{DepositMethod, DepositRequest, DepositStatus};
use crate::domain::error::{AuthError, CoinfolioError};
use crate::domain::transaction::{OrderType, Transaction, TransactionStatus, TransactionType};
use crate::domain::user::{Gender, Holding, User, UserRole};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{Credentials, DepositFilter, ProfileStore};
use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    balance REAL NOT NULL,
    date_of_birth TEXT,
    gender TEXT,
    address TEXT,
    version INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS holdings (
    user_id TEXT NOT NULL,
    symbol TEXT NOT NULL,
    name TEXT NOT NULL,
    amount REAL NOT NULL,
    value_usd REAL NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (user_id, symbol)
);
CREATE TABLE IF NOT EXISTS transactions (
    user_id TEXT NOT NULL,
    id TEXT NOT NULL,
    position INTEGER NOT NULL,
    date TEXT NOT NULL,
    type TEXT NOT NULL,
    order_type TEXT,
    asset TEXT NOT NULL,
    symbol TEXT NOT NULL,
    amount_coin REAL NOT NULL,
    amount_usd REAL NOT NULL,
    price_per_coin REAL NOT NULL,
    status TEXT NOT NULL,
    target_address TEXT,
    PRIMARY KEY (user_id, id)
);
CREATE TABLE IF NOT EXISTS deposit_requests (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    user_name TEXT NOT NULL,
    amount REAL NOT NULL,
    method TEXT NOT NULL,
    status TEXT NOT NULL,
    date TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id, position);
CREATE INDEX IF NOT EXISTS idx_deposits_status ON deposit_requests(status);
CREATE INDEX IF NOT EXISTS idx_deposits_user ON deposit_requests(user_id);";

fn pool_err(e: r2d2::Error) -> CoinfolioError {
    CoinfolioError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> CoinfolioError {
    CoinfolioError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(col: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, message.into())
}

fn parse_timestamp(col: usize, s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_err(col, format!("invalid timestamp {s:?}: {e}")))
}

fn parse_with<T>(
    col: usize,
    value: &str,
    what: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, rusqlite::Error> {
    parse(value).ok_or_else(|| conversion_err(col, format!("unknown {what} {value:?}")))
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CoinfolioError> {
        let settings = store_settings(config)?;
        Self::open(&settings.path, settings.pool_size)
    }

    pub fn open(db_path: &str, pool_size: u32) -> Result<Self, CoinfolioError> {
        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|c| c.busy_timeout(Duration::from_secs(5)));
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, CoinfolioError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;
        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), CoinfolioError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, CoinfolioError> {
        self.pool.get().map_err(pool_err)
    }
}

fn load_user(conn: &Connection, id: &str) -> Result<Option<User>, rusqlite::Error> {
    let user = conn
        .query_row(
            "SELECT id, email, name, role, balance, date_of_birth, gender, address, version
             FROM users WHERE id = ?1",
            params![id],
            |row| {
                let role: String = row.get(3)?;
                let dob: Option<String> = row.get(5)?;
                let gender: Option<String> = row.get(6)?;
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    role: parse_with(3, &role, "role", UserRole::parse)?,
                    balance: row.get(4)?,
                    holdings: Vec::new(),
                    transactions: Vec::new(),
                    date_of_birth: dob
                        .map(|d| {
                            NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                                .map_err(|e| conversion_err(5, e.to_string()))
                        })
                        .transpose()?,
                    gender: gender
                        .map(|g| parse_with(6, &g, "gender", Gender::parse))
                        .transpose()?,
                    address: row.get(7)?,
                    version: row.get::<_, i64>(8)? as u64,
                })
            },
        )
        .optional()?;

    let Some(mut user) = user else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT symbol, name, amount, value_usd FROM holdings
         WHERE user_id = ?1 ORDER BY position",
    )?;
    user.holdings = stmt
        .query_map(params![id], |row| {
            Ok(Holding {
                symbol: row.get(0)?,
                name: row.get(1)?,
                amount: row.get(2)?,
                value_usd: row.get(3)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, date, type, order_type, asset, symbol, amount_coin, amount_usd,
                price_per_coin, status, target_address
         FROM transactions WHERE user_id = ?1 ORDER BY position",
    )?;
    user.transactions = stmt
        .query_map(params![id], |row| {
            let date: String = row.get(1)?;
            let kind: String = row.get(2)?;
            let order_type: Option<String> = row.get(3)?;
            let status: String = row.get(9)?;
            Ok(Transaction {
                id: row.get(0)?,
                date: parse_timestamp(1, &date)?,
                kind: parse_with(2, &kind, "transaction type", TransactionType::parse)?,
                order_type: order_type
                    .map(|o| parse_with(3, &o, "order type", OrderType::parse))
                    .transpose()?,
                asset: row.get(4)?,
                symbol: row.get(5)?,
                amount_coin: row.get(6)?,
                amount_usd: row.get(7)?,
                price_per_coin: row.get(8)?,
                status: parse_with(9, &status, "status", TransactionStatus::parse)?,
                target_address: row.get(10)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    Ok(Some(user))
}

fn write_children(conn: &Connection, user: &User) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM holdings WHERE user_id = ?1", params![user.id])?;
    conn.execute("DELETE FROM transactions WHERE user_id = ?1", params![user.id])?;

    let mut stmt = conn.prepare(
        "INSERT INTO holdings (user_id, symbol, name, amount, value_usd, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (position, h) in user.holdings.iter().enumerate() {
        stmt.execute(params![
            user.id,
            h.symbol,
            h.name,
            h.amount,
            h.value_usd,
            position as i64
        ])?;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO transactions (user_id, id, position, date, type, order_type, asset,
             symbol, amount_coin, amount_usd, price_per_coin, status, target_address)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    for (position, t) in user.transactions.iter().enumerate() {
        stmt.execute(params![
            user.id,
            t.id,
            position as i64,
            t.date.to_rfc3339(),
            t.kind.as_str(),
            t.order_type.map(|o| o.as_str()),
            t.asset,
            t.symbol,
            t.amount_coin,
            t.amount_usd,
            t.price_per_coin,
            t.status.as_str(),
            t.target_address,
        ])?;
    }
    Ok(())
}

/// Version-checked update of the user row plus a rewrite of its children.
fn write_user(conn: &Connection, user: &User) -> Result<User, CoinfolioError> {
    let changed = conn
        .execute(
            "UPDATE users
             SET email = ?1, name = ?2, role = ?3, balance = ?4, date_of_birth = ?5,
                 gender = ?6, address = ?7, version = version + 1
             WHERE id = ?8 AND version = ?9",
            params![
                user.email,
                user.name,
                user.role.as_str(),
                user.balance,
                user.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
                user.gender.map(|g| g.as_str()),
                user.address,
                user.id,
                user.version as i64,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CoinfolioError::Auth(AuthError::EmailInUse)
            }
            other => query_err(other),
        })?;

    if changed == 0 {
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                params![user.id],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        return Err(if exists {
            CoinfolioError::Conflict {
                id: user.id.clone(),
            }
        } else {
            CoinfolioError::UserNotFound {
                id: user.id.clone(),
            }
        });
    }

    write_children(conn, user).map_err(query_err)?;
    let mut saved = user.clone();
    saved.version += 1;
    Ok(saved)
}

fn map_deposit(row: &rusqlite::Row<'_>) -> Result<DepositRequest, rusqlite::Error> {
    let method: String = row.get(4)?;
    let status: String = row.get(5)?;
    let date: String = row.get(6)?;
    Ok(DepositRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        amount: row.get(3)?,
        method: DepositMethod::from(method),
        status: parse_with(5, &status, "deposit status", DepositStatus::parse)?,
        date: parse_timestamp(6, &date)?,
    })
}

const DEPOSIT_COLUMNS: &str = "id, user_id, user_name, amount, method, status, date";

fn map_credentials(row: &rusqlite::Row<'_>) -> Result<Credentials, rusqlite::Error> {
    Ok(Credentials {
        user_id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
    })
}

impl ProfileStore for SqliteAdapter {
    fn create_user(&self, user: &User, password_hash: &str) -> Result<User, CoinfolioError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;

        let taken: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![user.email],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        if taken {
            return Err(AuthError::EmailInUse.into());
        }

        let mut created = user.clone();
        created.version = 1;
        tx.execute(
            "INSERT INTO users (id, email, password_hash, name, role, balance, date_of_birth,
                 gender, address, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                created.id,
                created.email,
                password_hash,
                created.name,
                created.role.as_str(),
                created.balance,
                created.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
                created.gender.map(|g| g.as_str()),
                created.address,
                created.version as i64,
            ],
        )
        .map_err(query_err)?;
        write_children(&tx, &created).map_err(query_err)?;
        tx.commit().map_err(query_err)?;
        Ok(created)
    }

    fn get_user(&self, id: &str) -> Result<User, CoinfolioError> {
        let conn = self.conn()?;
        load_user(&conn, id)
            .map_err(query_err)?
            .ok_or_else(|| CoinfolioError::UserNotFound { id: id.to_string() })
    }

    fn list_users(&self) -> Result<Vec<User>, CoinfolioError> {
        let conn = self.conn()?;
        let ids: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT id FROM users ORDER BY name COLLATE NOCASE, id")
                .map_err(query_err)?;
            stmt.query_map([], |row| row.get(0))
                .map_err(query_err)?
                .collect::<Result<_, _>>()
                .map_err(query_err)?
        };
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = load_user(&conn, &id).map_err(query_err)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    fn save_user(&self, user: &User) -> Result<User, CoinfolioError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;
        let saved = write_user(&tx, user)?;
        tx.commit().map_err(query_err)?;
        Ok(saved)
    }

    fn credentials_by_email(&self, email: &str) -> Result<Option<Credentials>, CoinfolioError> {
        self.conn()?
            .query_row(
                "SELECT id, email, password_hash FROM users WHERE email = ?1",
                params![email.trim()],
                map_credentials,
            )
            .optional()
            .map_err(query_err)
    }

    fn credentials_by_id(&self, user_id: &str) -> Result<Option<Credentials>, CoinfolioError> {
        self.conn()?
            .query_row(
                "SELECT id, email, password_hash FROM users WHERE id = ?1",
                params![user_id],
                map_credentials,
            )
            .optional()
            .map_err(query_err)
    }

    fn set_password_hash(&self, user_id: &str, password_hash: &str) -> Result<(), CoinfolioError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, user_id],
            )
            .map_err(query_err)?;
        if changed == 0 {
            return Err(CoinfolioError::UserNotFound {
                id: user_id.to_string(),
            });
        }
        Ok(())
    }

    fn create_deposit(&self, request: &DepositRequest) -> Result<(), CoinfolioError> {
        self.conn()?
            .execute(
                "INSERT INTO deposit_requests (id, user_id, user_name, amount, method, status, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    request.id,
                    request.user_id,
                    request.user_name,
                    request.amount,
                    request.method.to_string(),
                    request.status.as_str(),
                    request.date.to_rfc3339(),
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn get_deposit(&self, id: &str) -> Result<DepositRequest, CoinfolioError> {
        self.conn()?
            .query_row(
                &format!("SELECT {DEPOSIT_COLUMNS} FROM deposit_requests WHERE id = ?1"),
                params![id],
                map_deposit,
            )
            .optional()
            .map_err(query_err)?
            .ok_or_else(|| CoinfolioError::DepositNotFound { id: id.to_string() })
    }

    fn list_deposits(&self, filter: &DepositFilter) -> Result<Vec<DepositRequest>, CoinfolioError> {
        let mut clauses = Vec::new();
        let mut args: Vec<&dyn ToSql> = Vec::new();
        let status = filter.status.map(|s| s.as_str());
        if let Some(status) = &status {
            clauses.push(format!("status = ?{}", args.len() + 1));
            args.push(status);
        }
        if let Some(user_id) = &filter.user_id {
            clauses.push(format!("user_id = ?{}", args.len() + 1));
            args.push(user_id);
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {DEPOSIT_COLUMNS} FROM deposit_requests{where_clause} ORDER BY date DESC, id"
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(args.as_slice(), map_deposit)
            .map_err(query_err)?;
        rows.collect::<Result<_, _>>().map_err(query_err)
    }

    fn decide_deposit(
        &self,
        decided: &DepositRequest,
        credited: Option<&User>,
    ) -> Result<Option<User>, CoinfolioError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;

        let changed = tx
            .execute(
                "UPDATE deposit_requests SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![
                    decided.status.as_str(),
                    decided.id,
                    DepositStatus::Pending.as_str()
                ],
            )
            .map_err(query_err)?;
        if changed == 0 {
            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM deposit_requests WHERE id = ?1",
                    params![decided.id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(query_err)?;
            return Err(match current {
                Some(status) => CoinfolioError::InvalidTransition {
                    id: decided.id.clone(),
                    status,
                },
                None => CoinfolioError::DepositNotFound {
                    id: decided.id.clone(),
                },
            });
        }

        let saved = credited.map(|user| write_user(&tx, user)).transpose()?;
        tx.commit().map_err(query_err)?;
        Ok(saved)
    }
}
