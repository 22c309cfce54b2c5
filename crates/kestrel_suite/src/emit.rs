//! Frame emission through the injected dispatch callback.

use std::sync::Arc;

use kestrel_schema::{
    encode, Action, ActionBody, ErrorBody, FrameBody, Kind, Location, LogBody, SerializedError,
    Status, StatusBody, WireContext,
};

/// The native callback a sandbox uses to hand a frame to the coordinator.
pub type DispatchFn = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Encodes frames under a fixed wire context and pushes them through the
/// dispatch callback.
#[derive(Clone)]
pub struct FrameEmitter {
    dispatch: DispatchFn,
    wire: WireContext,
}

impl FrameEmitter {
    pub fn new(dispatch: DispatchFn, suite_id: &str, runner_id: &str) -> Self {
        Self {
            dispatch,
            wire: WireContext::new(suite_id, runner_id),
        }
    }

    /// Encodes and dispatches one frame.
    pub fn emit(&self, body: &FrameBody) {
        let bytes = encode(body, &self.wire);
        (self.dispatch)(&bytes);
    }

    pub fn status(&self, kind: Kind, status: Status, ancestry: &[String], description: &str) {
        self.emit(&FrameBody::Status(StatusBody {
            kind,
            status,
            ancestry: encode_ancestry(ancestry),
            description: description.to_owned(),
        }));
    }

    pub fn action(
        &self,
        kind: Kind,
        action: Action,
        ancestry: &[String],
        description: &str,
        errors: &[SerializedError],
        duration_ms: u32,
        location: Location,
    ) {
        let errors =
            serde_json::to_string(errors).expect("serialized errors always encode to JSON");
        self.emit(&FrameBody::Action(ActionBody {
            kind,
            action,
            ancestry: encode_ancestry(ancestry),
            description: description.to_owned(),
            errors,
            duration: duration_ms,
            location,
        }));
    }

    pub fn error(&self, error: &SerializedError) {
        self.emit(&FrameBody::Error(ErrorBody {
            error: error.to_json(),
        }));
    }

    pub fn log(&self, level: u8, context: &str, location: Location, description: &str) {
        self.emit(&FrameBody::Log(LogBody {
            level,
            context: context.to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            location,
            description: description.to_owned(),
        }));
    }
}

fn encode_ancestry(ancestry: &[String]) -> String {
    serde_json::to_string(ancestry).expect("a string list always encodes to JSON")
}
