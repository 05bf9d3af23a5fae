use clap::Parser;
use quad_hash::HashTable;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "capacity", default_value_t = 1024 * 1024)]
    capacity: usize,

    #[arg(short = 'l', long = "load-factor", default_value_t = 0.7)]
    load_factor: f64,

    /// Print the occupied slot map once the table is filled.
    #[arg(long = "dump")]
    dump: bool,
}

#[derive(Debug)]
struct Payload {
    junk: u32,
}

fn synthetic_key(i: u32) -> [u8; 16] {
    let fields = [i, i.wrapping_add(1), i.wrapping_mul(2), i % 100];

    let mut key = [0u8; 16];
    for (chunk, field) in key.chunks_exact_mut(4).zip(fields) {
        chunk.copy_from_slice(&field.to_le_bytes());
    }
    key
}

/// Synthetic keys are built from a `u32` counter, so larger requests clamp.
fn key_count(wanted: usize) -> u32 {
    u32::try_from(wanted).unwrap_or(u32::MAX)
}

fn main() {
    let args = Args::parse();

    let mut table: HashTable<Box<Payload>> = match HashTable::with_capacity(args.capacity) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("could not create table: {e}");
            std::process::exit(1);
        }
    };
    assert_eq!(table.capacity(), args.capacity);

    let wanted = (args.capacity as f64 * args.load_factor) as usize;
    let target = key_count(wanted);
    if target as usize != wanted {
        eprintln!("{wanted} keys requested; synthetic keys stop at {target}");
    }
    println!(
        "Filling {} slots with {} synthetic keys...",
        table.capacity(),
        target
    );

    let mut num_failures = 0;
    for i in 0..target {
        let payload = Box::new(Payload { junk: i });
        if let Err(e) = table.insert(&synthetic_key(i), payload) {
            num_failures += 1;
            if num_failures == 1 {
                eprintln!("first rejected key {i}: {e}");
            }
        }
    }

    println!("Inserted {} values into table", table.len());
    println!("Final load factor: {:.2}%", table.load_factor() * 100.0);
    println!(
        "Number of failed inserts: {} ({:.02}%)",
        num_failures,
        num_failures as f64 / target.max(1) as f64 * 100.0
    );

    table.probe_histogram().print();
    table.debug_stats().print();
    if args.dump {
        table.dump();
    }

    let mut checksum = 0u64;
    let mut entry = table.first().map(|(cursor, key, _)| (cursor, key.to_vec()));
    while let Some((cursor, key)) = entry {
        let payload = table
            .remove(&key)
            .expect("a visited key must still be present");
        checksum += u64::from(payload.junk);
        entry = table
            .next(cursor)
            .map(|(cursor, key, _)| (cursor, key.to_vec()));
    }
    assert_eq!(table.len(), 0);
    assert!(table.get(&synthetic_key(0)).is_none());

    println!(
        "Drained table ({} tombstones, checksum {checksum})",
        table.tombstones()
    );
    table.destroy();
}
