use actorsim::{MessagePayload, PlatformBuilder, Runtime, RuntimeConfig, SimError};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("═══════════════════════════════════════════════════════");
    println!("  actorsim — Deterministic Actor Execution Kernel");
    println!("  Failure injection + replay verification demo");
    println!("═══════════════════════════════════════════════════════");
    println!();

    // ── Run 1 ─────────────────────────────────────────────────
    let hash_1 = run_scenario("Run 1");

    // ── Run 2: identical replay ───────────────────────────────
    let hash_2 = run_scenario("Run 2");

    // ── Verify ────────────────────────────────────────────────
    println!("  Verification:");
    println!("    Run 1 trace hash: {:016x}", hash_1);
    println!("    Run 2 trace hash: {:016x}", hash_2);
    if hash_1 == hash_2 {
        println!("    ✓ Traces are IDENTICAL — deterministic replay confirmed.");
    } else {
        println!("    ✗ MISMATCH — determinism violation detected!");
        std::process::exit(1);
    }
}

/// A master hands work to two workers over a flaky link, then one worker
/// host crashes. Returns the trace hash.
fn run_scenario(label: &str) -> u64 {
    let platform = PlatformBuilder::new()
        .host("master", 1e9)
        .host("w1", 1e9)
        .host("w2", 2e9)
        .link("l1", 1e8, 1e-3)
        .link("l2", 1e8, 1e-3)
        .route("master", "w1", &["l1"])
        .route("master", "w2", &["l2"])
        .build()
        .expect("valid platform");
    let master = platform.host_by_name("master").expect("master host");
    let w1 = platform.host_by_name("w1").expect("w1 host");
    let w2 = platform.host_by_name("w2").expect("w2 host");
    let l1 = platform.link_by_name("l1").expect("l1 link");

    let mut rt = Runtime::with_config(platform, RuntimeConfig::default().with_strict_deadlock(false));

    rt.create("master", master, |ctx| async move {
        for task in 0..6 {
            let mailbox = if task % 2 == 0 { "w1" } else { "w2" };
            let payload = MessagePayload::Text(format!("task-{task}"));
            match ctx.put(mailbox, payload, 1e7).await {
                Ok(()) => {}
                Err(SimError::NetworkFailure(reason)) => {
                    println!("    [{}] master: task {task} lost ({reason})", ctx.now());
                }
                Err(err) => return Err(err),
            }
        }
        for mailbox in ["w1", "w2"] {
            ctx.put_detached(mailbox, "stop", 0.0)?;
        }
        Ok(())
    })
    .expect("actor creation");

    for (name, host) in [("w1", w1), ("w2", w2)] {
        rt.create(name, host, move |ctx| async move {
            ctx.on_exit(move |failed| {
                if failed {
                    println!("    worker {name}: terminated by failure");
                }
            })?;
            loop {
                let task = match ctx.get(name).await {
                    Ok(task) => task,
                    Err(err) if err.is_network_failure() => continue,
                    Err(err) => return Err(err),
                };
                if task.as_text() == Some("stop") {
                    return Ok(());
                }
                ctx.exec(5e8).await?;
            }
        })
        .expect("actor creation");
    }

    rt.schedule_turn_off(l1, 0.05).expect("known link");
    rt.schedule_turn_on(l1, 0.5).expect("known link");
    rt.schedule_turn_off(w2, 1.2).expect("known host");

    if let Err(err) = rt.run() {
        println!("    {label}: {err}");
    }
    println!(
        "  {}: finished at {}, {} trace entries",
        label,
        rt.now(),
        rt.trace().len()
    );
    rt.trace_hash()
}
