//! Enclave request/response protocol
//!
//! Four operations, each a named request answered by a correspondingly named
//! response:
//!
//! | Kind                  | Request event                  | Payload                         |
//! |-----------------------|--------------------------------|---------------------------------|
//! | `get-status`          | `request:get-status`           | `authData`                      |
//! | `start-onboarding`    | `request:start-onboarding`     | `authData`, `data.authId`       |
//! | `complete-onboarding` | `request:complete-onboarding`  | `authData`, `data.onboardingAuthentication` |
//! | `sign`                | `request:sign`                 | `authData`, `data.{keyType,bytes,encoding}` |

pub mod dispatch;
pub mod messages;

pub use dispatch::dispatch;
pub use messages::{
    AuthData, KeyType, RemoteRequest, RemoteResponse, Reply, RequestKind, SignPayload,
    SignatureBytes, SignerStatus, StatusPayload, DIGEST_ENCODING, SIGNER_KEY_TYPE,
};
