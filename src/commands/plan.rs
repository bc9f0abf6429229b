//! Plan command implementation

use spixfer_core::frame::FrameView;
use spixfer_core::{FrameBuilder, TransferConfig};
use std::path::Path;

/// Frame a file without touching hardware and print the result
pub fn run_plan(
    path: &Path,
    config: &TransferConfig,
    show_frames: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = config.layout()?;
    let builder = FrameBuilder::open_path(path)
        .map_err(|e| format!("Cannot open {}: {}", path.display(), e))?;

    println!("File: {}", path.display());
    match builder.total() {
        Some(total) => println!("Size: {} bytes", total),
        None => println!("Size: unknown"),
    }
    println!(
        "Frame size: {} bytes ({} header + {} payload)",
        layout.frame_size(),
        layout.frame_size() - layout.payload_capacity(),
        layout.payload_capacity()
    );
    if show_frames {
        println!();
        println!("{:>8} {:>8} {:>8}", "Frame", "Payload", "Padding");
    }

    let mut frames = builder.frames(layout);
    let mut count: u64 = 0;
    let mut last_len = 0;
    for frame in &mut frames {
        let frame = frame?;
        let view = FrameView::parse(&frame)?;
        count += 1;
        last_len = view.len;
        if show_frames {
            println!(
                "{:>8} {:>8} {:>8}",
                count,
                view.len,
                view.padding().len()
            );
        }
    }
    let stats = frames.close();

    if show_frames {
        println!();
    }
    println!("DATA frames: {}", count);
    if count > 0 {
        println!(
            "Last frame: {} bytes payload, {} bytes padding",
            last_len,
            layout.payload_capacity() - last_len
        );
    }
    println!(
        "Bus traffic: {} transactions, {} bytes (START + DATA + END, without busy retries)",
        count + 2,
        (count + 2) * layout.frame_size() as u64
    );
    log::debug!("Frame builder delivered {} bytes", stats.bytes_delivered);

    Ok(())
}
