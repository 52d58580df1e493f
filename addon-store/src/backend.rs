use crate::models::PublishedFileId;
use crate::{BackendError, Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use strum_macros::IntoStaticStr;

/// A call-by-name request to the backend process.
///
/// Serializes as `{ "cmd": <name>, "params": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, IntoStaticStr)]
#[serde(tag = "cmd", content = "params", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendRequest {
    BrowseMyWorkshop { page: u32 },
    BrowseInstalledAddons { page: u32 },
    GetInstalledAddon { path: String },
    GetWorkshopAddon { id: PublishedFileId },
}

impl BackendRequest {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// The external process that performs filesystem scans and catalog queries.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Issues one request and returns its raw JSON result.
    async fn invoke(&self, request: BackendRequest) -> std::result::Result<Value, BackendError>;
}

/// Invokes `request` and decodes the result into `R`.
pub(crate) async fn call<R>(backend: &dyn Backend, request: BackendRequest) -> Result<R>
where
    R: DeserializeOwned,
{
    let name = request.name();
    let value = backend
        .invoke(request)
        .await
        .map_err(|source| Error::Backend {
            request: name,
            source,
        })?;

    serde_json::from_value(value).map_err(|e| Error::Decode {
        request: name,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkshopItem;
    use serde_json::json;

    struct Echo(std::result::Result<Value, BackendError>);

    #[async_trait]
    impl Backend for Echo {
        async fn invoke(&self, _request: BackendRequest) -> std::result::Result<Value, BackendError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_request_names_and_wire_form() {
        let request = BackendRequest::GetWorkshopAddon {
            id: PublishedFileId(42),
        };

        assert_eq!(request.name(), "get_workshop_addon");
        assert_eq!(
            BackendRequest::BrowseInstalledAddons { page: 1 }.name(),
            "browse_installed_addons"
        );
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "cmd": "get_workshop_addon", "params": { "id": 42 } })
        );
    }

    #[tokio::test]
    async fn test_call_decodes_result() {
        let backend = Echo(Ok(json!({ "id": 42, "title": "Wire" })));

        let item: WorkshopItem = call(
            &backend,
            BackendRequest::GetWorkshopAddon {
                id: PublishedFileId(42),
            },
        )
        .await
        .unwrap();

        assert_eq!(item.title, "Wire");
    }

    #[tokio::test]
    async fn test_call_forwards_backend_error() {
        let backend = Echo(Err(BackendError::new("steam is not running")));

        let result: Result<WorkshopItem> =
            call(&backend, BackendRequest::BrowseMyWorkshop { page: 1 }).await;

        assert_eq!(
            result,
            Err(Error::Backend {
                request: "browse_my_workshop",
                source: BackendError::new("steam is not running"),
            })
        );
    }

    #[tokio::test]
    async fn test_call_reports_decode_failure() {
        let backend = Echo(Ok(json!({ "title": "missing id" })));

        let result: Result<WorkshopItem> = call(
            &backend,
            BackendRequest::GetWorkshopAddon {
                id: PublishedFileId(1),
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(Error::Decode {
                request: "get_workshop_addon",
                ..
            })
        ));
    }
}
