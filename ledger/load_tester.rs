use ledger::catalog::{GiftCatalog, PackageCatalog};
use ledger::ledger::Ledger;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Load testing tool for sustained ledger throughput
fn main() {
    println!("=== Coin Ledger Load Testing ===\n");

    test_sustained_purchases();
    test_mixed_workload();
    test_concurrent_gifts();
    test_contended_sender();
}

fn test_sustained_purchases() {
    println!("📈 Testing sustained purchases...");

    let duration = Duration::from_secs(10);
    let start = Instant::now();
    let ledger = Ledger::new();
    let catalog = PackageCatalog::default();
    let packages = catalog.packages();
    let mut operations: u64 = 0;

    while start.elapsed() < duration {
        let package = &packages[(operations as usize) % packages.len()];
        let user_id = operations % 10_000;
        if ledger.purchase(user_id, package).is_err() {
            println!("   Unexpected purchase failure for user {}", user_id);
        }
        operations += 1;
    }

    let elapsed = start.elapsed();
    let ops_per_second = operations as f64 / elapsed.as_secs_f64();

    println!("   Operations: {}", operations);
    println!("   Duration: {:.2}s", elapsed.as_secs_f64());
    println!("   Throughput: {:.0} ops/sec", ops_per_second);
    println!("   Accounts: {}\n", ledger.account_count());
    report_audit(&ledger);
}

fn test_mixed_workload() {
    println!("🔄 Testing mixed workload...");

    let duration = Duration::from_secs(10);
    let start = Instant::now();
    let ledger = Ledger::with_creator_share(75);
    let gifts = GiftCatalog::default();
    let gift_list = gifts.gifts();

    for user_id in 0..1_000 {
        ledger.credit(user_id, 10_000).ok();
    }

    let mut operations: u64 = 0;
    let mut gifts_sent = 0;
    let mut rejected = 0;

    while start.elapsed() < duration {
        let user_id = operations % 1_000;
        match operations % 4 {
            0 => {
                ledger.credit(user_id, 70).ok();
            }
            1 | 2 => {
                let gift = &gift_list[(operations as usize) % gift_list.len()];
                let recipient = (user_id + 1) % 1_000;
                match ledger.send_gift(user_id, recipient, gift.price, Some(gift.id)) {
                    Ok(_) => gifts_sent += 1,
                    Err(_) => rejected += 1,
                }
            }
            _ => {
                ledger.balance(user_id);
            }
        }
        operations += 1;
    }

    let elapsed = start.elapsed();
    let ops_per_second = operations as f64 / elapsed.as_secs_f64();

    println!("   Operations: {}", operations);
    println!("   Gifts sent: {}", gifts_sent);
    println!("   Gifts rejected: {}", rejected);
    println!("   Duration: {:.2}s", elapsed.as_secs_f64());
    println!("   Throughput: {:.0} ops/sec\n", ops_per_second);
    report_audit(&ledger);
}

fn test_concurrent_gifts() {
    println!("⚡ Testing concurrent gifts across users...");

    let ledger = Arc::new(Ledger::new());
    let operations = Arc::new(AtomicU64::new(0));
    let duration = Duration::from_secs(5);
    let num_threads: u64 = 4;
    let users_per_thread: u64 = 100;

    for user_id in 0..num_threads * users_per_thread {
        ledger.credit(user_id, 1_000_000).ok();
    }

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let ledger = Arc::clone(&ledger);
            let operations = Arc::clone(&operations);

            thread::spawn(move || {
                let start = Instant::now();
                let mut local_ops = 0;

                while start.elapsed() < duration {
                    let sender = (thread_id * users_per_thread + local_ops) % (num_threads * users_per_thread);
                    let recipient = (sender + 7) % (num_threads * users_per_thread);
                    ledger.send_gift(sender, recipient, 5, None).ok();
                    local_ops += 1;
                }

                operations.fetch_add(local_ops, Ordering::Relaxed);
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            println!("   Worker thread panicked");
        }
    }

    let total_ops = operations.load(Ordering::Relaxed);
    let ops_per_second = total_ops as f64 / duration.as_secs_f64();

    println!("   Threads: {}", num_threads);
    println!("   Total operations: {}", total_ops);
    println!("   Duration: {:.2}s", duration.as_secs_f64());
    println!("   Throughput: {:.0} ops/sec\n", ops_per_second);
    report_audit(&ledger);
}

fn test_contended_sender() {
    println!("🔒 Testing a single contended sender...");

    let ledger = Arc::new(Ledger::new());
    let starting_balance = 50_000;
    ledger.credit(0, starting_balance).ok();

    let accepted = Arc::new(AtomicU64::new(0));
    let num_threads = 8;

    let handles: Vec<_> = (1..=num_threads)
        .map(|recipient| {
            let ledger = Arc::clone(&ledger);
            let accepted = Arc::clone(&accepted);

            thread::spawn(move || {
                while ledger.send_gift(0, recipient, 3, None).is_ok() {
                    accepted.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            println!("   Worker thread panicked");
        }
    }

    let accepted = accepted.load(Ordering::Relaxed) as i64;
    println!("   Gifts accepted: {}", accepted);
    println!("   Expected: {}", starting_balance / 3);
    println!("   Remaining balance: {}\n", ledger.balance(0));
    report_audit(&ledger);
}

fn report_audit(ledger: &Ledger) {
    match ledger.audit() {
        Ok(()) => println!("   Audit: balances match transaction history\n"),
        Err(e) => println!("   Audit FAILED: {}\n", e),
    }
}
