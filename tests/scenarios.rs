//! End-to-end behaviour of the registry, forwarder and application surface

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use targetctl::{
    ApplicationCommandClient, ApplicationCommands, ApplicationCommandsCapability, Bundle,
    BundleCatalog, Capability, CommandFuture, Error, FutureState, LaunchConfiguration,
    MemoryBackend, Operation, Target, TargetId, TargetKind, TargetRegistry,
};

fn catalog() -> BundleCatalog {
    BundleCatalog::new()
        .with_bundle(Bundle::new("/bundles/app.ipa", "com.example.app", "Example"))
        .with_bundle(Bundle::new("/bundles/notes.ipa", "com.example.notes", "Notes"))
}

fn attach(registry: &TargetRegistry, id: &str, backend: Arc<dyn ApplicationCommands>) {
    registry
        .attach::<ApplicationCommandsCapability>(
            Target::new(id, format!("Simulator {id}"), TargetKind::Simulator),
            backend,
        )
        .unwrap();
}

// ─────────────────────────────────────────────────────────────────
// Application Surface
// ─────────────────────────────────────────────────────────────────

#[test]
fn install_makes_application_visible() {
    let registry = Arc::new(TargetRegistry::new());
    attach(&registry, "T1", Arc::new(MemoryBackend::new("T1", catalog())));
    let client = ApplicationCommandClient::new(registry);
    let t1 = TargetId::from("T1");

    assert!(!client.is_application_installed(&t1, "com.example.app").unwrap());

    client
        .wait(&client.install_application(&t1, "/bundles/app.ipa"))
        .unwrap();

    assert!(client.is_application_installed(&t1, "com.example.app").unwrap());
}

#[test]
fn unregistered_target_fails_without_blocking() {
    let client = ApplicationCommandClient::new(Arc::new(TargetRegistry::new()));
    let started = Instant::now();

    let future = client.installed_applications(&"T1".into());

    assert_eq!(future.state(), FutureState::Failed);
    assert!(matches!(
        future.wait_timeout(Duration::ZERO),
        Err(Error::CapabilityNotSupported { .. })
    ));
    assert!(matches!(
        client.is_application_installed(&"T1".into(), "com.example.app"),
        Err(Error::CapabilityNotSupported { .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn fan_out_listing_reports_each_target_in_order() {
    let registry = Arc::new(TargetRegistry::new());
    let t1 = Arc::new(MemoryBackend::new("T1", catalog()));
    let t2 = Arc::new(MemoryBackend::new("T2", catalog()));
    t2.inject_fault(Operation::ListInstalled, "lockdown service unavailable");
    attach(&registry, "T1", t1.clone());
    attach(&registry, "T2", t2);
    let client = ApplicationCommandClient::new(registry);

    for path in ["/bundles/app.ipa", "/bundles/notes.ipa"] {
        client
            .wait(&client.install_application(&"T1".into(), path))
            .unwrap();
    }

    let results = client
        .wait(&client.installed_applications_on(&["T1".into(), "T2".into()]))
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].target.as_str(), "T1");
    assert_eq!(results[0].result.as_ref().unwrap().len(), 2);
    assert_eq!(results[1].target.as_str(), "T2");
    match &results[1].result {
        Err(Error::Backend { message }) => assert_eq!(message, "lockdown service unavailable"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn killing_idle_application_has_no_side_effect() {
    let backend = Arc::new(MemoryBackend::new("T1", catalog()));
    let registry = Arc::new(TargetRegistry::new());
    attach(&registry, "T1", backend.clone());
    let client = ApplicationCommandClient::new(registry);
    let t1 = TargetId::from("T1");

    for path in ["/bundles/app.ipa", "/bundles/notes.ipa"] {
        client.wait(&client.install_application(&t1, path)).unwrap();
    }
    client
        .launch_application(&t1, &LaunchConfiguration::new("com.example.notes"))
        .unwrap();
    let before = backend.running_processes();

    assert!(matches!(
        client.kill_application(&t1, "com.example.app"),
        Err(Error::ApplicationNotRunning { .. })
    ));
    assert_eq!(backend.running_processes(), before);
    assert!(client.is_application_installed(&t1, "com.example.app").unwrap());
}

// ─────────────────────────────────────────────────────────────────
// Future Properties
// ─────────────────────────────────────────────────────────────────

#[test]
fn first_resolution_is_kept() {
    for (first, second) in [(1, 2), (7, 7), (0, -1)] {
        let (future, resolver) = CommandFuture::pending("first wins");
        assert!(resolver.resolve(first));
        assert!(!resolver.resolve(second));
        assert!(!resolver.cancel());
        assert_eq!(future.wait_timeout(Duration::ZERO).unwrap(), first);
    }
}

#[test]
fn callbacks_fire_once_in_registration_order() {
    let (future, resolver) = CommandFuture::pending("callbacks");
    let calls = Arc::new(Mutex::new(Vec::new()));

    for index in 0..10 {
        let calls = Arc::clone(&calls);
        future.on_completion(move |outcome| {
            assert!(outcome.is_success());
            calls.lock().unwrap().push(index);
        });
    }

    let resolvers: Vec<_> = (0..4)
        .map(|n| {
            let resolver = resolver.clone();
            thread::spawn(move || resolver.resolve(n))
        })
        .collect();
    let winners = resolvers
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    assert_eq!(*calls.lock().unwrap(), (0..10).collect::<Vec<_>>());
}

#[test]
fn cancelling_terminal_future_changes_nothing() {
    let succeeded = CommandFuture::resolved("done");
    let failed = CommandFuture::<()>::failed(Error::kill_failed("denied"));

    assert!(!succeeded.cancel());
    assert!(!failed.cancel());
    assert_eq!(succeeded.state(), FutureState::Succeeded);
    assert_eq!(failed.state(), FutureState::Failed);
}

// ─────────────────────────────────────────────────────────────────
// Registry Snapshots
// ─────────────────────────────────────────────────────────────────

#[test]
fn enumeration_is_unaffected_by_concurrent_detach() {
    let registry = Arc::new(TargetRegistry::new());
    let ids: Vec<String> = (0..20).map(|n| format!("T{n:02}")).collect();
    for id in &ids {
        attach(&registry, id, Arc::new(MemoryBackend::new(id.as_str(), catalog())));
    }

    let snapshot = registry.targets_supporting(ApplicationCommandsCapability::NAME);
    let detacher = {
        let registry = Arc::clone(&registry);
        let ids = ids.clone();
        thread::spawn(move || {
            for id in ids.iter().step_by(2) {
                registry.detach::<ApplicationCommandsCapability>(&TargetId::from(id.as_str()));
            }
        })
    };

    for _ in 0..50 {
        let seen: Vec<&str> = snapshot.ids().map(TargetId::as_str).collect();
        assert_eq!(seen, ids.iter().map(String::as_str).collect::<Vec<_>>());
    }
    detacher.join().unwrap();

    let after = registry.targets_supporting(ApplicationCommandsCapability::NAME);
    assert_eq!(after.len(), 10);
    assert_eq!(snapshot.len(), 20);
}

// ─────────────────────────────────────────────────────────────────
// Async Consumers
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn latent_operations_can_be_awaited() {
    let backend = MemoryBackend::new("T1", catalog()).with_latency(Duration::from_millis(20));
    let registry = Arc::new(TargetRegistry::new());
    attach(&registry, "T1", Arc::new(backend));
    let client = ApplicationCommandClient::new(registry);
    let t1 = TargetId::from("T1");

    let install = client.install_application(&t1, "/bundles/app.ipa");
    assert_eq!(install.state(), FutureState::Pending);
    tokio_test::assert_ok!(install.await);

    let apps = tokio_test::assert_ok!(client.installed_applications(&t1).await);
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].bundle_name(), "Example");
}

#[tokio::test]
async fn cancelled_latent_install_leaves_target_untouched() {
    let backend = Arc::new(
        MemoryBackend::new("T1", catalog()).with_latency(Duration::from_millis(50)),
    );
    let registry = Arc::new(TargetRegistry::new());
    attach(&registry, "T1", backend.clone());
    let client = ApplicationCommandClient::new(registry);

    let install = client.install_application(&"T1".into(), "/bundles/app.ipa");
    let listing = install.and_then({
        let client = client.clone();
        move |_| client.installed_applications(&"T1".into())
    });
    assert!(listing.cancel());

    assert!(matches!(install.await, Err(Error::Cancelled)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!backend.is_application_installed("com.example.app").unwrap());
}
