//! Ring detection helpers.

/// For every 6-bit pattern of same-colour neighbours, the circular runs of
/// set bits: `[count, first_dir_of_run...]`. Two neighbours in the same run are
/// adjacent through the run and never close a new ring; two in different runs
/// close one iff they already share a group.
pub(crate) static RUNS: [[u8; 4]; 64] = build_runs();

const fn build_runs() -> [[u8; 4]; 64] {
    let mut table = [[0u8; 4]; 64];
    let mut pattern = 0;
    while pattern < 64 {
        let mut count = 0;
        if pattern == 63 {
            table[pattern][0] = 1;
        } else {
            let mut dir = 0;
            while dir < 6 {
                // run start: set, and predecessor clear
                let set = (pattern >> dir) & 1 == 1;
                let prev_set = (pattern >> ((dir + 5) % 6)) & 1 == 1;
                if set && !prev_set {
                    count += 1;
                    table[pattern][count] = dir as u8;
                }
                dir += 1;
            }
            table[pattern][0] = count as u8;
        }
        pattern += 1;
    }
    table
}

/// Patterns with at least three circularly consecutive neighbours.
pub(crate) static LONG_RUN: [bool; 64] = build_long_runs();

const fn build_long_runs() -> [bool; 64] {
    let mut table = [false; 64];
    let mut pattern = 0;
    while pattern < 64 {
        let mut dir = 0;
        while dir < 6 {
            let a = (pattern >> dir) & 1;
            let b = (pattern >> ((dir + 1) % 6)) & 1;
            let c = (pattern >> ((dir + 2) % 6)) & 1;
            if a & b & c == 1 {
                table[pattern] = true;
            }
            dir += 1;
        }
        pattern += 1;
    }
    table
}
