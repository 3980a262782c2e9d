use relay_codec::*;
use std::io::Cursor;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("📬 Relay codec - last-seen acknowledgment window\n");

    let window = AckWindow::from_slots(42, [0, 1, 5, 19], 0x5A)
        .ok_or_else(|| anyhow::anyhow!("slot outside the window"))?;
    println!("   Window: {}", window);
    println!("   Acknowledged: {} of {}", window.acknowledged_count(), WINDOW_SIZE);

    for version in [ProtocolVersion::V1_20_3, ProtocolVersion::V1_21_5] {
        let mut buf = Vec::new();
        window.encode(&mut buf, version)?;
        let decoded = AckWindow::decode(&mut Cursor::new(&buf), version)?;

        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("📦 {}", version);
        println!("   Checksum on wire: {}", AckWindow::has_checksum(version));
        println!("   Bytes: {:02x?}", buf);
        println!("   Decoded: {}", decoded);
    }

    // Another 7 messages arrived; slots stay as they were
    let shifted = window.shift_by(7);
    println!("\n➡️  Shifted by 7: {}", shifted);

    Ok(())
}
