//! Tether Registry
//!
//! A side-table recording which trigger bindings exist for each deployment,
//! so a later run can tear them down or reconcile them. Items are grouped
//! per application: the backing table is named [`table_name`] of the app.

mod error;
mod item;
mod memory;

pub use error::RegistryError;
pub use item::{FUNCTION_KIND, RegistryItem};
pub use memory::InMemoryRegistry;

use async_trait::async_trait;

/// Fixed prefix of every registry table.
pub const TABLE_PREFIX: &str = "TetherRegistry";

/// Storage key of the registry for `app_name`.
pub fn table_name(app_name: &str) -> String {
  format!("{TABLE_PREFIX}{app_name}")
}

/// Persistence for [`RegistryItem`]s.
#[async_trait]
pub trait Registry: Send + Sync {
  /// Insert or replace the item with `item.id`.
  async fn put(&self, app_name: &str, item: &RegistryItem) -> Result<(), RegistryError>;

  /// Returns [`RegistryError::NotFound`] if no item has that id.
  async fn get(&self, app_name: &str, id: &str) -> Result<RegistryItem, RegistryError>;

  /// Deleting a missing item is not an error.
  async fn delete(&self, app_name: &str, id: &str) -> Result<(), RegistryError>;
}
