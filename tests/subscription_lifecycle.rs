//! End-to-end lifecycle: trial, payment, scheduled cancellation, sweep.

mod common;

use serde_json::json;
use tokio::sync::watch;

use common::{t0, TestApp};
use subledger::application::handlers::subscription::{
    AttachExternalRefsCommand, AttachExternalRefsHandler, CancelSubscriptionCommand,
    CancelSubscriptionHandler, CheckFeatureAccessHandler, CheckFeatureAccessQuery,
    CreateSubscriptionCommand, CreateSubscriptionHandler, GetAuditTrailHandler,
    GetAuditTrailQuery, ReactivateSubscriptionCommand, ReactivateSubscriptionHandler,
};
use subledger::domain::audit::Actor;
use subledger::domain::foundation::UserId;
use subledger::domain::subscription::{ExternalRefs, LedgerError, SubscriptionStatus};
use subledger::ports::{EventOutcome, SubscriptionStore};

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

#[tokio::test]
async fn trial_to_paid_to_canceled_at_period_end() {
    let app = TestApp::new();
    let owner = user("7");
    let actor = Actor::User(owner.clone());
    let (_tx, running) = watch::channel(false);

    // Day 0: start a 14 day trial.
    let created = CreateSubscriptionHandler::new(app.ledger.clone())
        .handle(CreateSubscriptionCommand {
            user_id: owner.clone(),
            plan_id: "premium".into(),
            trial_days: Some(14),
        })
        .await
        .unwrap()
        .subscription;
    assert_eq!(created.status, SubscriptionStatus::Trialing);
    assert!(created.is_trialing);
    let trial_end = created.trial_end.unwrap();
    assert_eq!(trial_end, t0().add_days(14));

    let access = CheckFeatureAccessHandler::new(app.ledger.clone());
    let allowed = access
        .handle(CheckFeatureAccessQuery {
            user_id: owner.clone(),
            feature: "advanced_price_alerts".into(),
        })
        .await
        .unwrap();
    assert!(allowed.allowed);

    AttachExternalRefsHandler::new(app.ledger.clone())
        .handle(AttachExternalRefsCommand {
            subscription_id: created.id,
            actor: actor.clone(),
            refs: ExternalRefs {
                customer: Some("cus_ext_1".into()),
                subscription: Some("sub_ext_1".into()),
                price: Some("price_premium_monthly".into()),
            },
        })
        .await
        .unwrap();

    // Day 12: the sweeper warns about the trial ending.
    app.clock.advance_days(12);
    let report = app.sweeper().run_once(&running).await;
    assert_eq!(report.trial_notices_sent, 1);
    assert_eq!(app.notifier.templates().len(), 1);

    // Day 14: first invoice is paid.
    app.clock.set(trial_end);
    let period_end = trial_end.add_days(30);
    let result = app
        .reconciler()
        .handle(app.signed_event(
            "evt_paid_1",
            "invoice.payment_succeeded",
            json!({
                "id": "in_1",
                "customer": "cus_ext_1",
                "subscription": "sub_ext_1",
                "lines": { "data": [ {
                    "period": { "start": trial_end.as_unix_secs(), "end": period_end.as_unix_secs() },
                    "price": { "id": "price_premium_monthly" }
                } ] }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(result.outcome, EventOutcome::Applied);
    assert_eq!(result.subscription_id, Some(created.id));

    let paid = app.store.find_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(paid.status, SubscriptionStatus::Active);
    assert!(!paid.is_trialing);
    assert_eq!(paid.current_period_start, trial_end);
    assert_eq!(paid.current_period_end, period_end);

    // Day 15: the user cancels at period end and keeps access meanwhile.
    app.clock.advance_days(1);
    let pending = CancelSubscriptionHandler::new(app.ledger.clone())
        .handle(CancelSubscriptionCommand {
            subscription_id: created.id,
            actor: actor.clone(),
            immediate: false,
        })
        .await
        .unwrap()
        .subscription;
    assert_eq!(pending.status, SubscriptionStatus::Active);
    assert!(pending.cancel_at_period_end);
    assert!(access
        .handle(CheckFeatureAccessQuery {
            user_id: owner.clone(),
            feature: "advanced_price_alerts".into(),
        })
        .await
        .unwrap()
        .allowed);

    // Before the period ends the sweeper leaves it alone.
    let report = app.sweeper().run_once(&running).await;
    assert_eq!(report.cancellations_applied, 0);

    // Past the period end the sweeper cancels it.
    app.clock.set(period_end.add_secs(1));
    let report = app.sweeper().run_once(&running).await;
    assert_eq!(report.cancellations_applied, 1);

    let canceled = app.store.find_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(canceled.status, SubscriptionStatus::Canceled);
    assert!(!canceled.cancel_at_period_end);
    assert!(canceled.canceled_at.is_some());
    assert!(!access
        .handle(CheckFeatureAccessQuery {
            user_id: owner.clone(),
            feature: "advanced_price_alerts".into(),
        })
        .await
        .unwrap()
        .allowed);

    // Every step left an audit record, oldest first.
    let trail = GetAuditTrailHandler::new(app.ledger.clone())
        .handle(GetAuditTrailQuery {
            subscription_id: created.id,
        })
        .await
        .unwrap();
    let actions: Vec<&str> = trail.iter().map(|r| r.action.as_str()).collect();
    assert_eq!(
        actions,
        vec!["create", "attach_external_refs", "renew_period", "schedule_cancel", "cancel"]
    );
    assert!(trail.iter().all(|r| r.success));
    assert_eq!(trail.last().unwrap().actor, Some(Actor::Sweeper));
}

#[tokio::test]
async fn pending_cancel_can_be_reactivated_before_the_period_ends() {
    let app = TestApp::new();
    let owner = user("8");
    let actor = Actor::User(owner.clone());

    let sub = CreateSubscriptionHandler::new(app.ledger.clone())
        .handle(CreateSubscriptionCommand {
            user_id: owner.clone(),
            plan_id: "pro".into(),
            trial_days: None,
        })
        .await
        .unwrap()
        .subscription;
    assert_eq!(sub.status, SubscriptionStatus::Active);

    app.clock.advance_days(3);
    CancelSubscriptionHandler::new(app.ledger.clone())
        .handle(CancelSubscriptionCommand {
            subscription_id: sub.id,
            actor: actor.clone(),
            immediate: false,
        })
        .await
        .unwrap();

    app.clock.advance_days(1);
    let resumed = ReactivateSubscriptionHandler::new(app.ledger.clone())
        .handle(ReactivateSubscriptionCommand {
            subscription_id: sub.id,
            actor: actor.clone(),
        })
        .await
        .unwrap()
        .subscription;
    assert_eq!(resumed.status, SubscriptionStatus::Active);
    assert!(!resumed.cancel_at_period_end);

    // Nothing is left for the sweeper once the period ends.
    app.clock.set(sub.current_period_end.add_secs(1));
    let (_tx, running) = watch::channel(false);
    let report = app.sweeper().run_once(&running).await;
    assert_eq!(report.cancellations_applied, 0);
    let stored = app.store.find_by_id(&sub.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn canceled_user_can_subscribe_again_but_only_once() {
    let app = TestApp::new();
    let owner = user("9");
    let create = CreateSubscriptionHandler::new(app.ledger.clone());
    let command = || CreateSubscriptionCommand {
        user_id: owner.clone(),
        plan_id: "premium".into(),
        trial_days: None,
    };

    let first = create.handle(command()).await.unwrap().subscription;
    let err = create.handle(command()).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadySubscribed { .. }));

    CancelSubscriptionHandler::new(app.ledger.clone())
        .handle(CancelSubscriptionCommand {
            subscription_id: first.id,
            actor: Actor::User(owner.clone()),
            immediate: true,
        })
        .await
        .unwrap();

    let second = create.handle(command()).await.unwrap().subscription;
    assert_ne!(second.id, first.id);
    assert_eq!(
        app.store.find_live_for_user(&owner).await.unwrap().map(|s| s.id),
        Some(second.id)
    );
    assert_eq!(app.store.len().await, 2);
}

#[tokio::test]
async fn unpaid_trial_falls_to_past_due_and_recovers_on_payment() {
    let app = TestApp::new();
    let owner = user("10");
    let sub = CreateSubscriptionHandler::new(app.ledger.clone())
        .handle(CreateSubscriptionCommand {
            user_id: owner.clone(),
            plan_id: "premium".into(),
            trial_days: Some(7),
        })
        .await
        .unwrap()
        .subscription;
    AttachExternalRefsHandler::new(app.ledger.clone())
        .handle(AttachExternalRefsCommand {
            subscription_id: sub.id,
            actor: Actor::User(owner.clone()),
            refs: ExternalRefs {
                customer: None,
                subscription: Some("sub_ext_10".into()),
                price: None,
            },
        })
        .await
        .unwrap();

    app.clock.set(sub.trial_end.unwrap().add_secs(60));
    let (_tx, running) = watch::channel(false);
    let report = app.sweeper().run_once(&running).await;
    assert_eq!(report.trials_expired, 1);
    let lapsed = app.store.find_by_id(&sub.id).await.unwrap().unwrap();
    assert_eq!(lapsed.status, SubscriptionStatus::PastDue);
    assert!(!lapsed.is_trialing);

    app.clock.advance_secs(3600);
    let result = app
        .reconciler()
        .handle(app.signed_event(
            "evt_recover",
            "invoice.payment_succeeded",
            json!({ "id": "in_10", "subscription": "sub_ext_10" }),
        ))
        .await
        .unwrap();
    assert_eq!(result.outcome, EventOutcome::Applied);

    let recovered = app.store.find_by_id(&sub.id).await.unwrap().unwrap();
    assert_eq!(recovered.status, SubscriptionStatus::Active);
    assert!(recovered.current_period_end > app.ledger.now());
}
