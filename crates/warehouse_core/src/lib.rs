pub mod audit;
pub mod domain;
pub mod error;
pub mod layout;
pub mod links;
pub mod locks;
pub mod memory;
pub mod ports;
pub mod reconcile;
pub mod sequence;
pub mod service;
pub mod versions;

pub use domain::{
    Actor, CreateDocument, Document, DocumentHistory, DocumentKind, Line, LogAction, LogEntry,
    SlugLink, UpdateDocument, VersionSnapshot,
};
pub use error::{DocumentError, DocumentResult};
pub use layout::DocumentTables;
pub use memory::{FixedClock, MemoryRowStore};
pub use ports::{CellSpan, Clock, PortError, PortResult, Row, RowStore, SystemClock, TableRef};
pub use service::{
    DeleteOutcome, DocumentService, DriftReport, MutationOutcome, RepairOutcome, SideEffect,
    SideEffectFailure,
};
