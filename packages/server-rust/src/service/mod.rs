//! Operation routing and execution.
//!
//! 1. **Registry** (`registry`): components resolved by kind and id
//! 2. **Facades** (`state`, `secret`, `publish`): uniform operations over backends
//! 3. **Relay** (`relay`, `worker`): consumption loops delivering to the application
//! 4. **Middleware** (`middleware`): Tower layers around dispatch
//! 5. **Routing** (`router`): `OperationRequest` to facade dispatch

pub mod middleware;
pub mod operation;
pub mod publish;
pub mod registry;
pub mod relay;
pub mod router;
pub mod secret;
pub mod state;
pub mod worker;

pub use middleware::{build_operation_pipeline, Pipeline};
pub use operation::{Operation, OperationRequest, OperationResponse};
pub use publish::PublishFacade;
pub use registry::{Component, ComponentRegistry, ComponentRegistryBuilder};
pub use relay::{Relayer, RouteTable};
pub use router::{Dispatcher, Facades};
pub use secret::SecretFacade;
pub use state::StateFacade;
pub use worker::{ConsumptionLoop, DeliveryHandler};
