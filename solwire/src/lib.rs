//! Wire-level client stack for an SVM chain.
//!
//! Everything that leaves the process over the network lives here: the
//! JSON-RPC client, the delegated-signing service client, the local
//! ed25519 signer, and the swap-routing SDK client. The crate deals in
//! serialized transactions only; it never constructs or rewrites
//! instructions.

pub mod error;
pub mod rpc;
pub mod signer;
pub mod swap;
pub mod tx;

pub use error::SolwireError;
pub use rpc::{ConfirmOutcome, RpcClient};
pub use signer::{LocalSigner, RemoteSigner};
pub use swap::{ClaimablePosition, SwapClient, SwapQuote};
pub use tx::{SignedTransaction, UnsignedTransaction};
