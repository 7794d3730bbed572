#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use deskroute::application::engine::{AssignmentEngine, EngineOptions, EngineParts};
use deskroute::application::filters::SpecializationFilter;
use deskroute::application::notify::{Notice, NotificationSink};
use deskroute::infra::memory::InMemoryBackend;

/// Six records covering every scoring branch, six open tickets in category 1
/// and a small help catalog.
///
/// | id | tier      | rating | max | current | available | score |
/// |----|-----------|--------|-----|---------|-----------|-------|
/// | 1  | primary   | 5      | 10  | 0       | yes       | 100   |
/// | 2  | backup    | 3      | 5   | 4       | yes       | 7     |
/// | 3  | secondary | 4      | 4   | 4       | yes       | 0     |
/// | 4  | primary   | -      | 0   | 0       | yes       | 0     |
/// | 5  | secondary | 4      | 8   | 2       | no        | 0     |
/// | 6  | secondary | 5      | 10  | 5       | yes       | 40    |
pub const SEED: &str = r#"{
    "specializations": [
        {"id": 1, "counselor_id": 10, "category_id": 1, "priority_tier": "primary",
         "expertise_rating": 5, "max_workload": 10, "current_workload": 0, "is_available": true},
        {"id": 2, "counselor_id": 20, "category_id": 1, "priority_tier": "backup",
         "expertise_rating": 3, "max_workload": 5, "current_workload": 4, "is_available": true},
        {"id": 3, "counselor_id": 30, "category_id": 1, "priority_tier": "secondary",
         "expertise_rating": 4, "max_workload": 4, "current_workload": 4, "is_available": true},
        {"id": 4, "counselor_id": 10, "category_id": 2, "priority_tier": "primary",
         "max_workload": 0, "current_workload": 0, "is_available": true},
        {"id": 5, "counselor_id": 40, "category_id": 2, "priority_tier": "secondary",
         "expertise_rating": 4, "max_workload": 8, "current_workload": 2, "is_available": false},
        {"id": 6, "counselor_id": 50, "category_id": 1, "priority_tier": "secondary",
         "expertise_rating": 5, "max_workload": 10, "current_workload": 5, "is_available": true}
    ],
    "tickets": [
        {"id": 101, "subject": "Cannot log in", "category_id": 1, "status": "open", "priority": "medium"},
        {"id": 102, "subject": "Exam stress", "category_id": 1, "status": "open", "priority": "high"},
        {"id": 103, "subject": "Housing question", "category_id": 1, "status": "open", "priority": "low"},
        {"id": 104, "subject": "Schedule change", "category_id": 1, "status": "open", "priority": "medium"},
        {"id": 105, "subject": "Grief support", "category_id": 1, "status": "open", "priority": "urgent"},
        {"id": 106, "subject": "Roommate conflict", "category_id": 1, "status": "open", "priority": "medium"}
    ],
    "faqs": [
        {"id": 1, "category_id": 1, "question": "How do I book?", "answer": "Use the portal.", "featured": true},
        {"id": 2, "category_id": 2, "question": "Is it confidential?", "answer": "Yes."}
    ],
    "categories": [
        {"id": 1, "name": "Academic"},
        {"id": 2, "name": "Personal", "description": "Wellbeing and personal matters"}
    ]
}"#;

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices lock").clone()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices().pop()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("notices lock").push(notice);
    }
}

pub struct Harness {
    pub backend: Arc<InMemoryBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: AssignmentEngine,
}

pub fn harness() -> Harness {
    harness_with(EngineOptions::default())
}

pub fn harness_with(options: EngineOptions) -> Harness {
    let backend = Arc::new(InMemoryBackend::from_json(SEED).expect("seed should parse"));
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = AssignmentEngine::new(
        EngineParts::from_backend(Arc::clone(&backend), notifier.clone()),
        options,
    );
    Harness {
        backend,
        notifier,
        engine,
    }
}

/// Harness with the registry already loaded.
pub async fn loaded() -> Harness {
    let harness = harness();
    let fetched = harness
        .engine
        .fetch_specializations(&SpecializationFilter::default(), false)
        .await
        .expect("initial fetch");
    assert!(!fetched.is_stale());
    assert_eq!(fetched.data, 6);
    harness
}
