pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod locale;
pub mod state;

// Re-export main types for convenience
pub use client::{DynExamBackend, ExamBackend, ExamClient, GradeRequest};
pub use config::Config;
pub use controller::{
    Controller, ControllerOptions, ControllerState, OperationKind, SubmitOutcome, NEW_QUESTION_TOKEN,
};
pub use error::{ClientError, TranscriptError};
pub use locale::{Locale, Strings};
pub use state::{ChatRole, Message, MessageHandle, MessagePatch, RenderState, Transcript};
