//! User callbacks attached to schema nodes.
//!
//! All callbacks are asynchronous and take owned values, so they can be
//! stored in an immutable schema shared across tasks. The pipeline awaits
//! them one at a time in declaration order.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dynaql_model::Value;
use futures::future::BoxFuture;

macro_rules! callback {
    (
        $(#[$meta:meta])*
        $name:ident ( $($arg:ident),* ) -> $out:ty
    ) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(Arc<dyn Fn($(callback!(@ty $arg)),*) -> BoxFuture<'static, $out> + Send + Sync>);

        impl $name {
            /// Wrap an async function.
            pub fn new<F, Fut>(f: F) -> Self
            where
                F: Fn($(callback!(@ty $arg)),*) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = $out> + Send + 'static,
            {
                Self(Arc::new(move |$($arg: Value),*| -> BoxFuture<'static, $out> {
                    Box::pin(f($($arg),*))
                }))
            }

            /// Invoke the callback.
            pub async fn call(&self, $($arg: Value),*) -> $out {
                (self.0)($($arg),*).await
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "(..)"))
            }
        }
    };
    (@ty $arg:ident) => { Value };
}

callback! {
    /// Computes a default from the whole item being written.
    ComputedDefault(item) -> Value
}

callback! {
    /// Replaces a value before it is written. Receives the value as the
    /// caller passed it (dates are not parsed yet), the whole item and the
    /// caller's context.
    Setter(value, item, context) -> Value
}

callback! {
    /// Replaces a value after it is read. Receives the value, the whole item
    /// and the caller's context.
    Getter(value, item, context) -> Value
}

callback! {
    /// Checks a value; a returned message is a validation failure.
    Validator(value) -> Option<String>
}
