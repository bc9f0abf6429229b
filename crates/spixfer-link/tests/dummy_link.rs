//! End-to-end transfers over the dummy link

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use spixfer_core::{CancelFlag, Error, NoProgress, TransferConfig, TransferObserver, TransferReport};
use spixfer_link::open_link;

fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("spixfer-{}-{}", std::process::id(), name));
    fs::write(&path, contents).unwrap();
    path
}

#[derive(Default)]
struct Recorder {
    attempts: Vec<bool>,
    started: Option<Option<u64>>,
    frames: Vec<(u64, usize)>,
    completed: Option<TransferReport>,
}

impl TransferObserver for Recorder {
    fn handshake_attempt(&mut self, _attempt: u32, acknowledged: bool) {
        self.attempts.push(acknowledged);
    }

    fn started(&mut self, total_bytes: Option<u64>) {
        self.started = Some(total_bytes);
    }

    fn frame_sent(&mut self, index: u64, len: usize, _bytes_sent: u64) {
        self.frames.push((index, len));
    }

    fn completed(&mut self, report: &TransferReport) {
        self.completed = Some(*report);
    }
}

#[test]
fn test_send_file() {
    let data: Vec<u8> = (0..3000u32).map(|i| (i % 253) as u8).collect();
    let path = temp_file("send", &data);

    let mut link = open_link("dummy:busy_starts=2,busy=3", None).unwrap();
    assert_eq!(link.bus_name(), "dummy");
    assert_eq!(link.ready_name(), "dummy");

    let mut recorder = Recorder::default();
    let report = link
        .send_file(&path, TransferConfig::default(), None, &mut recorder)
        .unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(report.total_bytes, Some(3000));
    assert_eq!(report.bytes_sent, 3000);
    assert_eq!(report.data_frames, 3);
    assert_eq!(report.start_attempts, 3);
    assert_eq!(recorder.attempts, vec![false, false, true]);
    assert_eq!(recorder.started, Some(Some(3000)));
    assert_eq!(recorder.frames, vec![(1, 1021), (2, 1021), (3, 958)]);
    assert_eq!(recorder.completed, Some(report));
}

#[test]
fn test_send_empty_file() {
    let path = temp_file("empty", &[]);
    let mut link = open_link("dummy", Some("dummy")).unwrap();

    let report = link
        .send_file(&path, TransferConfig::default(), None, &mut NoProgress)
        .unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(report.bytes_sent, 0);
    assert_eq!(report.data_frames, 0);
    assert_eq!(report.frames_sent, 2);
}

#[test]
fn test_missing_file() {
    let path = std::env::temp_dir().join("spixfer-does-not-exist.bin");
    let mut link = open_link("dummy", None).unwrap();

    let result = link.send_file(&path, TransferConfig::default(), None, &mut NoProgress);
    assert_eq!(result, Err(Error::NotFound));
}

#[test]
fn test_cancelled_transfer() {
    let path = temp_file("cancel", &[0x55; 100]);
    let mut link = open_link("dummy:boot=1000000", None).unwrap();

    let cancel = Arc::new(CancelFlag::new());
    cancel.cancel();
    let config = TransferConfig::default().with_wait(spixfer_core::WaitPolicy::unbounded(1000));
    let result = link.send_file(&path, config, Some(cancel), &mut NoProgress);
    fs::remove_file(&path).unwrap();

    assert_eq!(result, Err(Error::Cancelled));
}

#[test]
fn test_dummy_rejects_foreign_ready_line() {
    assert!(open_link("dummy", Some("linux_gpio:gpiochip=0,line=1")).is_err());
    assert!(open_link("dummy:busy=lots", None).is_err());
}
