//! Shared test helpers for TUI sub-module tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eisaku_core::{ClientError, Controller, ControllerOptions, ExamBackend, GradeRequest};

use crate::app::App;
use crate::render::MessageRenderer;

/// Backend that answers every call immediately with fixed text.
#[derive(Default)]
pub struct StubBackend;

#[async_trait]
impl ExamBackend for StubBackend {
    async fn request_question(&self, _institution: &str) -> Result<String, ClientError> {
        Ok("stub question".to_string())
    }

    async fn request_grade(&self, _request: &GradeRequest) -> Result<String, ClientError> {
        Ok("stub grade".to_string())
    }
}

pub fn app_with(backend: StubBackend) -> App {
    let institutions = vec![
        "First Univ".to_string(),
        "Second Univ".to_string(),
        "Third Univ".to_string(),
    ];
    let options = ControllerOptions {
        institution: institutions[0].clone(),
        ..ControllerOptions::default()
    };
    let controller = Controller::new(Arc::new(backend), options);
    let renderer = MessageRenderer::new(Duration::from_millis(450));
    App::new(controller, renderer, institutions, "http://exam.test".to_string())
}
