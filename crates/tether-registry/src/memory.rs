use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RegistryError;
use crate::item::RegistryItem;
use crate::{Registry, table_name};

/// Registry kept in process memory. Tables are created on first write.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
  tables: Arc<RwLock<HashMap<String, HashMap<String, RegistryItem>>>>,
}

impl InMemoryRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// All items stored for `app_name`.
  pub async fn items(&self, app_name: &str) -> Vec<RegistryItem> {
    self
      .tables
      .read()
      .await
      .get(&table_name(app_name))
      .map(|table| table.values().cloned().collect())
      .unwrap_or_default()
  }
}

#[async_trait]
impl Registry for InMemoryRegistry {
  async fn put(&self, app_name: &str, item: &RegistryItem) -> Result<(), RegistryError> {
    self
      .tables
      .write()
      .await
      .entry(table_name(app_name))
      .or_default()
      .insert(item.id.clone(), item.clone());
    Ok(())
  }

  async fn get(&self, app_name: &str, id: &str) -> Result<RegistryItem, RegistryError> {
    let table = table_name(app_name);
    self
      .tables
      .read()
      .await
      .get(&table)
      .and_then(|items| items.get(id))
      .cloned()
      .ok_or_else(|| RegistryError::NotFound {
        table,
        id: id.to_string(),
      })
  }

  async fn delete(&self, app_name: &str, id: &str) -> Result<(), RegistryError> {
    if let Some(items) = self.tables.write().await.get_mut(&table_name(app_name)) {
      items.remove(id);
    }
    Ok(())
  }
}
