//! End-to-end: patient session -> HTTP endpoint -> broker -> staff dashboard.

use api_rest::{router, AppState};
use chrono::NaiveDate;
use relay_broker::InMemoryBroker;
use relay_core::{Field, SyncStatus, Topic};
use relay_dashboard::{ConnectionState, DisplayState, LiveView, Outcome};
use relay_emitter::{FormSession, FormSync, HttpPublisher, PublishError, SubmitError};
use std::sync::Arc;
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(50);

async fn start_relay(broker: InMemoryBroker) -> String {
    let app = router(AppState::new(Arc::new(broker), Topic::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}/api/sync-form")
}

async fn next_content(view: &mut LiveView) -> Outcome {
    loop {
        let outcome = tokio::time::timeout(Duration::from_secs(5), view.step())
            .await
            .expect("event within 5s")
            .expect("subscription open");
        if !matches!(outcome, Outcome::ConnectionChanged(_)) {
            return outcome;
        }
    }
}

#[tokio::test]
async fn typing_submit_and_clear_reach_the_dashboard() {
    let broker = InMemoryBroker::new();
    let endpoint = start_relay(broker.clone()).await;
    let mut view = LiveView::mount(&broker, &Topic::default())
        .await
        .expect("mount");

    let publisher = HttpPublisher::new(endpoint).expect("client");
    let mut session = FormSession::new(FormSync::spawn(Arc::new(publisher), QUIET));

    for (field, value) in [
        (Field::FirstName, "Elon"),
        (Field::LastName, "Musk"),
        (Field::DateOfBirth, "1971-06-28"),
        (Field::Gender, "male"),
        (Field::PhoneNumber, "0812345678"),
        (Field::Email, "elon@example.com"),
        (Field::Address, "1 Rocket Road"),
        (Field::PreferredLanguage, "English"),
        (Field::Nationality, "American"),
    ] {
        session.set_field(field, value);
    }

    assert_eq!(
        next_content(&mut view).await,
        Outcome::Applied(SyncStatus::Typing)
    );
    assert_eq!(view.state().connection(), ConnectionState::Connected);
    let shown = view.state().current().expect("data").envelope.record.clone();
    assert_eq!(shown.get(Field::Nationality), Some("American"));

    let today = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
    session.submit(today).await.expect("submitted");
    assert_eq!(
        next_content(&mut view).await,
        Outcome::Applied(SyncStatus::Submitted)
    );

    session.clear();
    assert_eq!(next_content(&mut view).await, Outcome::Cleared);
    assert_eq!(view.state().display(), DisplayState::NoData);

    session.close().await;
    view.unmount().await;
}

#[tokio::test]
async fn submit_fails_when_broker_refuses() {
    let broker = InMemoryBroker::new();
    broker.set_accepting(false);
    let endpoint = start_relay(broker.clone()).await;

    let publisher = HttpPublisher::new(endpoint).expect("client");
    let mut session = FormSession::new(FormSync::spawn(Arc::new(publisher), QUIET));
    for (field, value) in [
        (Field::FirstName, "Ada"),
        (Field::LastName, "Lovelace"),
        (Field::DateOfBirth, "1815-12-10"),
        (Field::Gender, "female"),
        (Field::PhoneNumber, "123456789"),
        (Field::Email, "ada@example.com"),
        (Field::Address, "12 St James's Square"),
        (Field::PreferredLanguage, "English"),
        (Field::Nationality, "British"),
    ] {
        session.set_field(field, value);
    }

    let today = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
    match session.submit(today).await {
        Err(SubmitError::Publish(PublishError::Rejected { status, message })) => {
            assert_eq!(status, 500);
            assert!(message.starts_with("Failed to sync: "));
        }
        other => panic!("expected a publish rejection, got {other:?}"),
    }
    assert!(broker.published().is_empty());
    session.close().await;
}
