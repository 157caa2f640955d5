use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use imagemeta_core::{AttributeField, MetadataAttributes};
use imagemeta_harness::{TestStore, short_attrs};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Collects formatted events so a test can inspect them.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("capture buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture<T>(f: impl FnOnce() -> T) -> (T, String) {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .with_ansi(false)
        .with_writer(captured.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, captured.text())
}

#[test]
fn save_and_find_log_under_their_targets() -> TestResult {
    let s = TestStore::memory();
    let attrs = short_attrs("released");

    let (result, logs) = capture(|| -> TestResult {
        s.save(&attrs, "ami-1")?;
        s.save(&attrs, "ami-1")?;
        s.find_all()?;
        Ok(())
    });
    result?;

    assert!(logs.contains("imagemeta::save"), "{logs}");
    assert!(logs.contains("saved cloud image metadata"), "{logs}");
    assert!(logs.contains("image id unchanged, nothing to write"), "{logs}");
    assert!(logs.contains("imagemeta::find"), "{logs}");
    assert!(logs.contains("searched cloud image metadata"), "{logs}");
    assert!(logs.contains("matched=1"), "{logs}");
    assert!(logs.contains("wildcard=true"), "{logs}");
    Ok(())
}

#[test]
fn failed_save_is_logged_as_warning() -> TestResult {
    let s = TestStore::memory();
    s.collection().fail_next_run("no reachable servers")?;

    let (result, logs) = capture(|| {
        s.save(
            &MetadataAttributes::default().with(AttributeField::Stream, "released"),
            "ami-1",
        )
    });
    assert!(result.is_err());

    assert!(logs.contains("WARN"), "{logs}");
    assert!(logs.contains("save failed"), "{logs}");
    assert!(logs.contains("no reachable servers"), "{logs}");
    Ok(())
}
