//! Domain identifiers (strongly-typed IDs).
//!
//! # 2 種類の ID
//! - **TaskId**: ストアが採番する単調増加の整数（SQLite の `INTEGER PRIMARY KEY`）。
//!   作成順の tie-break にも使うので、比較可能であることが重要です。
//! - **CycleId**: self-healing サイクルごとの ULID。ログ・イベントの相関に使います。
//!
//! ## Phantom Type パターン
//! ULID 系の ID は `Id<T>` で共通実装を持ち、`T` はマーカー型として
//! コンパイル時にだけ区別されます（CycleId と他の ID を混同できない）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Identifier of a Task, assigned by the TaskStore.
///
/// 値は 1 から始まる単調増加。`Display` は `task-<n>`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// IdMarker は ULID 系 ID のマーカー trait
///
/// Display で使うプレフィックス（"cycle-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ULID ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// self-healing サイクルのマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cycle {}

impl IdMarker for Cycle {
    fn prefix() -> &'static str {
        "cycle-"
    }
}

/// Identifier of one self-healing cycle run.
pub type CycleId = Id<Cycle>;
