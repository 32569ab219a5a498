use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use dynaql_model::{StoreError, Value};
use parking_lot::Mutex;

use super::Model;
use crate::callback::{Getter, Setter};
use crate::date::DateFormat;
use crate::schema::{FieldDecl, GlobalIndexRole, LocalIndexRole, Schema, SchemaDecl};
use crate::transport::{StoreRequest, StoreResponse, Transport};

/// Records requests and answers with queued responses.
#[derive(Debug, Default)]
pub(crate) struct StubTransport {
    requests: Mutex<Vec<StoreRequest>>,
    responses: Mutex<VecDeque<Result<StoreResponse, StoreError>>>,
}

impl StubTransport {
    pub(crate) fn respond(&self, response: impl Into<StoreResponse>) {
        self.responses.lock().push_back(Ok(response.into()));
    }

    pub(crate) fn fail(&self, err: StoreError) {
        self.responses.lock().push_back(Err(err));
    }

    pub(crate) fn requests(&self) -> Vec<StoreRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: StoreRequest) -> Result<StoreResponse, StoreError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(StoreError::transport("no response queued")))
    }
}

/// `users`: `id` partition key, `createdAt` sort key, `byTeam` global index
/// on `team`/`rank`, local index `score`.
pub(crate) fn users_schema() -> Schema {
    let domain = Setter::new(|v: Value, _item, ctx: Value| async move {
        match (v.as_str(), ctx.get("domain").as_str()) {
            (Some(user), Some(domain)) if !user.contains('@') => {
                Value::from(format!("{user}@{domain}"))
            }
            _ => v,
        }
    });
    let masked = Getter::new(|v: Value, _item, _ctx| async move {
        if v.is_undefined() {
            v
        } else {
            Value::from("***")
        }
    });
    Schema::new(
        &SchemaDecl::new()
            .field("id", FieldDecl::string().primary_index())
            .field("createdAt", FieldDecl::date().format(DateFormat::Epoch).sort_key())
            .field(
                "team",
                FieldDecl::string().gsi(GlobalIndexRole {
                    index_name: "byTeam".into(),
                    sort_key: false,
                    project: None,
                    capacity: None,
                }),
            )
            .field(
                "rank",
                FieldDecl::number().gsi(GlobalIndexRole {
                    index_name: "byTeam".into(),
                    sort_key: true,
                    project: None,
                    capacity: None,
                }),
            )
            .field(
                "score",
                FieldDecl::number().lsi(LocalIndexRole {
                    index_name: None,
                    project: None,
                }),
            )
            .field("name", FieldDecl::string().trim().capitalize())
            .field("email", FieldDecl::string().trim().setter(domain))
            .field("secret", FieldDecl::string().trim().getter(masked))
            .field("age", FieldDecl::number().min(0))
            .field("tags", FieldDecl::set(FieldDecl::string())),
    )
    .expect("users schema")
}

pub(crate) fn users(transport: &Arc<StubTransport>) -> Model {
    Model::new("users", Arc::new(users_schema()), transport.clone())
}
