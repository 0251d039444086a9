/*!
# Cosim Simulator

Scripted federates and scenarios for exercising the co-simulation kernel
without external simulators.

## Key Components:
- **Scripted federates:** `FederateHandle`s that follow a declarative script of
  time steps, subscriptions and publications.
- **Call log:** a global, ordered record of every kernel-to-federate call.
- **Chaos:** optional failure, hang or panic injection at a chosen time.
- **Scenarios:** YAML documents that build a whole federation.
- **Recording monitor:** captures kernel notifications for assertions.
*/

pub mod call_log;
pub mod chaos;
pub mod federate;
pub mod recorder;
pub mod scenario;
pub mod script;

pub use call_log::{Call, CallLog, CallRecord};
pub use chaos::{FaultKind, FaultSpec};
pub use federate::ScriptedFederate;
pub use recorder::{MonitorEvent, RecordingMonitor};
pub use scenario::{Scenario, ScenarioError};
pub use script::{FederateScript, PublishSpec};
