use relay_codec::*;
use std::io::Cursor;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("🔁 Relay codec - structured value per protocol version");

    // Optional TOML config as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => CodecConfig::load(path)?,
        None => CodecConfig::default(),
    };
    println!("⚙️  Config: {:?}\n", config);

    let codec = Arc::new(JsonTextCodec);
    let component = serde_json::json!({
        "text": "Welcome, ",
        "color": "gold",
        "extra": [{"text": "player", "bold": true}, "!"]
    });
    let holder = JsonValueHolder::from_object(ProtocolVersion::V1_20_3, codec.clone(), component);

    for version in [
        ProtocolVersion::V1_12_2,
        ProtocolVersion::V1_13,
        ProtocolVersion::V1_20_3,
    ] {
        let mut buf = Vec::new();
        holder.write_to_wire(&mut buf, version)?;

        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("📦 {} → {:?}", version, WireForm::for_version(version));
        println!("   Bytes: {}", buf.len());
        println!("   Hex: {}", hex_preview(&buf, 32));

        let decoded = JsonValueHolder::read_from_wire_with(&mut Cursor::new(&buf), version, codec.clone(), &config)?;
        println!("   Decoded: {}", decoded.as_text()?);
    }

    println!("\n🏷️  Registry-key arguments");
    for kind in ArgumentKind::ALL {
        let argument = kind.construct("minecraft:worldgen/biome".to_string());
        let mut buf = Vec::new();
        ArgumentRegistry::write_with_identifier(&argument, &mut buf, ProtocolVersion::V1_20_3)?;
        let decoded = ArgumentRegistry::read_with_identifier(&mut Cursor::new(&buf), ProtocolVersion::V1_20_3)?;
        println!("   {:<32} {} bytes → {:?}", kind.identifier(), buf.len(), decoded);
    }

    Ok(())
}

fn hex_preview(bytes: &[u8], limit: usize) -> String {
    let shown: Vec<String> = bytes.iter().take(limit).map(|b| format!("{:02x}", b)).collect();
    if bytes.len() > limit {
        format!("{} …", shown.join(" "))
    } else {
        shown.join(" ")
    }
}
