#![allow(missing_docs)]
#![cfg(feature = "tracing")]

use grove::{Error, Inject, Injector, InjectorConfig, ScopeTag, Stage};
use std::{
    io::Write,
    sync::{Arc, Mutex, PoisonError},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn capture(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let _guard = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(move || writer.clone()))
        .set_default();

    f();
    captured.contents()
}

struct Clock;

impl Inject for Clock {
    type Deps = ();

    fn scope() -> ScopeTag {
        ScopeTag::Singleton
    }

    fn inject(_: ()) -> Result<Self, Error> {
        Ok(Clock)
    }
}

#[test]
fn it_logs_synthesized_bindings() {
    let mut root_id = None;
    let logs = capture(|| {
        let mut builder = Injector::builder();
        builder.constructible::<Clock>();
        let root = builder.build().unwrap();
        let child = root.child_builder().build().unwrap();

        child.get::<Clock>().unwrap();
        root_id = Some(root.id());
    });

    assert!(logs.contains("synthesized binding for"));
    let root_id = root_id.unwrap();
    assert!(logs.contains(&format!("owned by injector {root_id}")));
}

#[test]
fn it_logs_failed_construction() {
    let logs = capture(|| {
        let mut builder = Injector::builder();
        builder.bind::<String>()
            .to_provider(|_: Injector| -> Result<String, Error> { Err(Error::other("boom")) })
            .in_singleton();
        let result = builder
            .with_config(InjectorConfig::default().with_stage(Stage::Production))
            .build();

        assert!(result.is_err());
    });

    assert!(logs.contains("WARN"));
    assert!(logs.contains("boom"));
}
