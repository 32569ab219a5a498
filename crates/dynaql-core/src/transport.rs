//! The seam between the mapper and a store client.
//!
//! A [`Model`](crate::model::Model) never talks to the network itself. It
//! builds a [`StoreRequest`] and hands it to a [`Transport`]; the response
//! comes back as the matching [`StoreResponse`] variant. The
//! [`Transport`] trait uses `#[async_trait]` because models hold it as a
//! trait object.

use async_trait::async_trait;

use dynaql_model::StoreError;
use dynaql_model::StoreOperation;
use dynaql_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, TransactGetItemsInput, TransactWriteItemsInput, UpdateItemInput,
};
use dynaql_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput, TransactGetItemsOutput, TransactWriteItemsOutput, UpdateItemOutput,
};

/// Sends compiled requests to a store.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. Store-reported failures are returned unmodified.
    async fn send(&self, request: StoreRequest) -> Result<StoreResponse, StoreError>;
}

macro_rules! store_messages {
    ($($op:ident($input:ty, $output:ty)),* $(,)?) => {
        /// A request for one item-level operation.
        #[derive(Debug, Clone, PartialEq)]
        pub enum StoreRequest {
            $(
                #[doc = concat!("`", stringify!($op), "`.")]
                $op($input),
            )*
        }

        /// The response to a [`StoreRequest`].
        #[derive(Debug, Clone, PartialEq)]
        pub enum StoreResponse {
            $(
                #[doc = concat!("`", stringify!($op), "`.")]
                $op($output),
            )*
        }

        impl StoreRequest {
            /// The operation this request targets.
            #[must_use]
            pub fn operation(&self) -> StoreOperation {
                match self {
                    $(Self::$op(_) => StoreOperation::$op,)*
                }
            }
        }

        impl StoreResponse {
            /// The operation this response answers.
            #[must_use]
            pub fn operation(&self) -> StoreOperation {
                match self {
                    $(Self::$op(_) => StoreOperation::$op,)*
                }
            }
        }

        $(
            impl From<$input> for StoreRequest {
                fn from(input: $input) -> Self {
                    Self::$op(input)
                }
            }

            impl From<$output> for StoreResponse {
                fn from(output: $output) -> Self {
                    Self::$op(output)
                }
            }

            impl TryFrom<StoreResponse> for $output {
                type Error = StoreError;

                fn try_from(response: StoreResponse) -> Result<Self, StoreError> {
                    match response {
                        StoreResponse::$op(output) => Ok(output),
                        other => Err(StoreError::transport(format!(
                            "expected a {} response, received {}",
                            StoreOperation::$op,
                            other.operation()
                        ))),
                    }
                }
            }
        )*
    };
}

store_messages! {
    PutItem(PutItemInput, PutItemOutput),
    GetItem(GetItemInput, GetItemOutput),
    UpdateItem(UpdateItemInput, UpdateItemOutput),
    DeleteItem(DeleteItemInput, DeleteItemOutput),
    Query(QueryInput, QueryOutput),
    Scan(ScanInput, ScanOutput),
    BatchGetItem(BatchGetItemInput, BatchGetItemOutput),
    BatchWriteItem(BatchWriteItemInput, BatchWriteItemOutput),
    TransactGetItems(TransactGetItemsInput, TransactGetItemsOutput),
    TransactWriteItems(TransactWriteItemsInput, TransactWriteItemsOutput),
}
