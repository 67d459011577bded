use colortouch::{ColorTouchClient, Protocol, SensorType};
use std::env;

#[tokio::main]
async fn main() -> colortouch::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let addr = args
        .get(1)
        .expect("usage: status <addr> [--https] [--json] [--pin <pin>] [--user <name> --pass <password>]");
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let mut builder = ColorTouchClient::builder(addr);
    if args.iter().any(|a| a == "--https") {
        builder = builder.protocol(Protocol::Https);
    }
    if let Some(pin) = flag("--pin") {
        builder = builder.pin(pin);
    }
    if let (Some(user), Some(pass)) = (flag("--user"), flag("--pass")) {
        builder = builder.credentials(user, pass);
    }
    let mut client = builder.build()?;

    client.login().await?;
    if let Some(id) = client.identity() {
        println!(
            "{} ({:?}) firmware {} api v{}",
            id.model, id.thermostat_type, id.firmware, id.api_version
        );
    }

    client.update_info().await?;
    if args.iter().any(|a| a == "--json") {
        let snapshot = serde_json::json!({
            "identity": client.identity(),
            "control": client.control(),
            "settings": client.settings(),
        });
        println!("{snapshot:#}");
    }
    if let (Some(control), Some(settings)) = (client.control(), client.settings()) {
        println!(
            "[{}] mode: {:?} | state: {:?} | fan: {:?} | heat {} / cool {} ({:?})",
            settings.name,
            control.mode,
            control.state,
            control.fan,
            control.heat_temp,
            control.cool_temp,
            settings.api_units,
        );
        println!(
            "schedule: {} ({:?}) | away: {:?} | humidify: {:?} | dehumidify: {:?}",
            settings.schedule,
            settings.schedule_part,
            settings.away,
            settings.hum_setpoint,
            settings.dehum_setpoint
        );
    }

    client.update_sensors().await?;
    if let Some(indoor) = client.indoor_temperature() {
        println!(
            "Indoor: {:.1}\u{00b0}C / {:.1}\u{00b0}F, humidity {:?}",
            indoor.celsius(),
            indoor.fahrenheit(),
            client.indoor_humidity()
        );
    }
    if let Some(outdoor) = client.outdoor_temperature() {
        println!("Outdoor: {:.1}\u{00b0}C / {:.1}\u{00b0}F", outdoor.celsius(), outdoor.fahrenheit());
    }
    for kind in SensorType::ALL {
        for name in client.get_sensor_list(Some(kind)) {
            println!(
                "  {kind:?} {name}: temp {:?} hum {:?} battery {:?}",
                client.get_sensor(&name, "temp"),
                client.get_sensor(&name, "hum"),
                client.get_sensor(&name, "battery"),
            );
        }
    }

    match client.update_alerts().await {
        Ok(alerts) => println!("{} alerts", alerts.len()),
        Err(e) => eprintln!("alerts unavailable: {e}"),
    }

    Ok(())
}
