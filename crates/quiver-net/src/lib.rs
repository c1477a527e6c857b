#![forbid(unsafe_code)]

//! HTTP transport seam for quiver.
//!
//! Everything that touches the network goes through the [`Net`] trait, so the
//! engine core can be driven by a mock origin in tests. [`HttpClient`] is the
//! production implementation; [`TimeoutNet`] and [`RetryNet`] are decorators
//! composed via [`NetExt`].

mod client;
mod error;
mod retry;
mod timeout;
mod traits;
mod types;

pub use crate::{
    client::HttpClient,
    error::{NetError, NetResult},
    retry::{DefaultRetryClassifier, DefaultRetryPolicy, RetryClassifier, RetryNet, RetryPolicyTrait},
    timeout::TimeoutNet,
    traits::{Net, NetExt},
    types::{Headers, NetOptions, RetryPolicy},
};

/// Mock origin for downstream tests (enable the `mock` feature).
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    pub use crate::traits::NetMock;
}
