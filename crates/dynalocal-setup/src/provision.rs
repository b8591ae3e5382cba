//! ---
//! dl_section: "04-setup-orchestration"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Concurrent table deletion and creation."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use dynalocal_client::TableClient;
use dynalocal_common::TableDefinition;
use futures::future::{join_all, try_join_all};
use tracing::{debug, warn};

use crate::error::{DeletionError, ProvisionError};

/// Delete every named table concurrently.
///
/// All deletions run to completion. Returns the tables that were removed and
/// the failures, which callers treat as non-fatal.
pub async fn delete_tables<'a, I>(client: &dyn TableClient, names: I) -> (Vec<String>, Vec<DeletionError>)
where
    I: IntoIterator<Item = &'a String>,
{
    let outcomes = join_all(names.into_iter().map(|name| async move {
        let result = client.delete_table(name).await;
        (name, result)
    }))
    .await;

    let mut deleted = Vec::new();
    let mut failures = Vec::new();
    for (name, result) in outcomes {
        match result {
            Ok(()) => {
                debug!(table = %name, "table deleted");
                deleted.push(name.clone());
            }
            Err(source) => {
                warn!(table = %name, error = %source, "unable to delete table");
                failures.push(DeletionError {
                    table: name.clone(),
                    source,
                });
            }
        }
    }
    (deleted, failures)
}

/// Create every definition concurrently, stopping at the first failure.
pub async fn create_tables<'a, I>(client: &dyn TableClient, tables: I) -> Result<Vec<String>, ProvisionError>
where
    I: IntoIterator<Item = &'a TableDefinition>,
{
    try_join_all(tables.into_iter().map(|table| async move {
        client
            .create_table(table)
            .await
            .map_err(|source| ProvisionError {
                table: table.table_name.clone(),
                source,
            })?;
        debug!(table = %table.table_name, "table created");
        Ok::<_, ProvisionError>(table.table_name.clone())
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use dynalocal_client::ClientError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        refuse: BTreeSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingClient {
        fn refusing(names: &[&str]) -> Self {
            Self {
                refuse: names.iter().map(|name| name.to_string()).collect(),
                ..Self::default()
            }
        }

        fn check(&self, op: &'static str, name: &str) -> Result<(), ClientError> {
            self.calls.lock().push(format!("{op}:{name}"));
            if self.refuse.contains(name) {
                return Err(ClientError::Service {
                    operation: op,
                    status: 400,
                    code: "ValidationException".into(),
                    message: format!("{name} refused"),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TableClient for RecordingClient {
        async fn list_table_names(&self) -> Result<Vec<String>, ClientError> {
            Ok(Vec::new())
        }

        async fn create_table(&self, table: &TableDefinition) -> Result<(), ClientError> {
            self.check("CreateTable", table.name())
        }

        async fn delete_table(&self, name: &str) -> Result<(), ClientError> {
            self.check("DeleteTable", name)
        }
    }

    #[tokio::test]
    async fn deletion_failures_do_not_stop_other_deletions() {
        let client = RecordingClient::refusing(&["b"]);
        let names: BTreeSet<String> = ["a", "b", "c"].iter().map(|n| n.to_string()).collect();

        let (deleted, failures) = delete_tables(&client, &names).await;

        assert_eq!(deleted, ["a", "c"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].table, "b");
        assert_eq!(client.calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn creation_failure_names_the_table() {
        let client = RecordingClient::refusing(&["Orders"]);
        let tables = [TableDefinition::new("Users"), TableDefinition::new("Orders")];

        let err = create_tables(&client, &tables).await.unwrap_err();

        assert_eq!(err.table, "Orders");
        assert_eq!(err.source.code(), Some("ValidationException"));
    }

    #[tokio::test]
    async fn all_tables_are_created_in_declaration_order() {
        let client = RecordingClient::default();
        let tables = [TableDefinition::new("Users"), TableDefinition::new("Orders")];

        let created = create_tables(&client, &tables).await.unwrap();

        assert_eq!(created, ["Users", "Orders"]);
    }

    #[tokio::test]
    async fn nothing_to_do_is_not_an_error() {
        let client = RecordingClient::default();
        let (deleted, failures) = delete_tables(&client, &BTreeSet::<String>::new()).await;
        assert!(deleted.is_empty() && failures.is_empty());
        assert!(create_tables(&client, &Vec::<TableDefinition>::new()).await.unwrap().is_empty());
        assert!(client.calls.lock().is_empty());
    }
}
