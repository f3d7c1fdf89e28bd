use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ulid::Ulid;

use slotbook::engine::Engine;
use slotbook::model::*;
use slotbook::store::{InMemoryStore, ReservationStore, WalStore};

// 2025-01-03T12:00:00Z
const REFERENCE: Ms = 1_735_905_600_000;

fn bench_wal_path() -> PathBuf {
    let dir = std::env::temp_dir().join("slotbook_bench");
    std::fs::create_dir_all(&dir).expect("create bench dir");
    dir.join(format!("{}.wal", Ulid::new()))
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn wal_engine(compact_threshold: u64) -> Arc<Engine> {
    let store = WalStore::open(bench_wal_path(), compact_threshold).expect("open WAL store");
    Arc::new(Engine::new(Arc::new(store)))
}

async fn phase1_sequential(label: &str, store: Arc<dyn ReservationStore>) {
    let engine = Engine::new(store);
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for _ in 0..n {
        let t = Instant::now();
        engine
            .allocate_next(Priority::P2, REFERENCE)
            .await
            .expect("allocate");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    println!(
        "  {label}: {n} allocations in {:.2}s ({:.0} ops/s)",
        elapsed.as_secs_f64(),
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("allocate_next", &mut latencies);
}

/// Many tasks hammering the same class: they serialize on the class lock,
/// so this measures queueing plus group commit.
async fn phase2_same_class(engine: Arc<Engine>) {
    let tasks = 32;
    let per_task = 25;
    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..tasks {
        let eng = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(per_task);
            for _ in 0..per_task {
                let t = Instant::now();
                eng.allocate_next(Priority::P3, REFERENCE)
                    .await
                    .expect("allocate");
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in handles {
        all.extend(h.await.expect("task panicked"));
    }
    let elapsed = start.elapsed();
    let stored = engine.reservations(Priority::P3).await.expect("load");
    println!(
        "  {tasks} tasks x {per_task}: {} slots stored in {:.2}s",
        stored.len(),
        elapsed.as_secs_f64()
    );
    print_latency("allocate_next (contended)", &mut all);
}

/// One task per class at once; classes never wait on each other.
async fn phase3_all_classes(engine: Arc<Engine>) {
    let rounds = 200;
    let start = Instant::now();
    let mut handles = Vec::new();

    for priority in Priority::ALL {
        let eng = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(rounds);
            for _ in 0..rounds {
                let t = Instant::now();
                match priority.family() {
                    Family::Basic => {
                        eng.allocate_next(priority, REFERENCE).await.expect("allocate");
                    }
                    Family::Recurring => {
                        // Bounded by the 52-week window; keep batches small.
                        if eng.allocate_batch(priority, REFERENCE, 1, 1).await.is_err() {
                            break;
                        }
                    }
                }
                latencies.push(t.elapsed());
            }
            (priority, latencies)
        }));
    }

    for h in handles {
        let (priority, mut latencies) = h.await.expect("task panicked");
        print_latency(&format!("{priority}"), &mut latencies);
    }
    println!("  all classes done in {:.2}s", start.elapsed().as_secs_f64());
}

async fn phase4_replay(compact_threshold: u64) {
    let path = bench_wal_path();
    {
        let engine = Engine::new(Arc::new(
            WalStore::open(path.clone(), compact_threshold).expect("open WAL store"),
        ));
        for _ in 0..1000 {
            engine
                .allocate_next(Priority::P1, REFERENCE)
                .await
                .expect("allocate");
        }
    }
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    let t = Instant::now();
    let store = WalStore::open(path, compact_threshold).expect("reopen WAL store");
    let replay = t.elapsed();
    let stored = store.load(Priority::P1).await.expect("load");
    println!(
        "  threshold={compact_threshold}: log {size} bytes, replayed {} slots in {:.2}ms",
        stored.reservations.len(),
        replay.as_secs_f64() * 1000.0
    );
}

#[tokio::main]
async fn main() {
    println!("=== slotbook stress benchmark ===");

    println!("\n[phase 1] sequential allocation");
    phase1_sequential("memory", Arc::new(InMemoryStore::new())).await;
    phase1_sequential(
        "wal",
        Arc::new(WalStore::open(bench_wal_path(), 1000).expect("open WAL store")),
    )
    .await;

    println!("\n[phase 2] contended single class");
    phase2_same_class(wal_engine(1000)).await;

    println!("\n[phase 3] all classes in parallel");
    phase3_all_classes(wal_engine(1000)).await;

    println!("\n[phase 4] replay after restart");
    phase4_replay(100_000).await;
    phase4_replay(100).await;

    println!("\n=== benchmark complete ===");
}
