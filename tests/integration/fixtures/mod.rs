// Known simulation-output layouts with hand-computed statistics
// WHY: the expected values below are derived by hand, independent of the accumulator

/// Reference file from the data contract: mean power 150, wind vector (3, 4, 0) -> 5.0
pub const REFERENCE_OUT: &str = "\
Predictions were generated on 01-Jan-2024 at 12:00:00
Description from the FAST input file: 10 m/s turbulent case

Time GenPwr WindHubVelX WindHubVelY WindHubVelZ
(s) (kW) (m/s) (m/s) (m/s)
0 100 3 4 0
1 200 3 4 0
";

/// Header and units only
pub const HEADER_ONLY_OUT: &str = "\
Time GenPwr WindHubVelX WindHubVelY WindHubVelZ
(s) (kW) (m/s) (m/s) (m/s)
";

/// No marker column anywhere
pub const NO_HEADER_OUT: &str = "\
This file was truncated before the channel list
0 100 3 4 0
1 200 3 4 0
";

/// Short trailing write and a non-numeric value
pub const RAGGED_OUT: &str = "\
Time GenPwr GenTq WindHubVelX WindHubVelY WindHubVelZ
(s) (kW) (kN-m) (m/s) (m/s) (m/s)
0 100 10 6 8 0
1 ***** 20 6 8 0
2 200 30 6 8 0
3 300 4";

/// Build a full-channel file with constant values per row
pub fn constant_file(power: f64, wind: (f64, f64, f64), rows: usize) -> String {
    let mut content = String::from(
        "Time GenPwr GenTq GenSpeed RtAeroCp RtAeroCt BldPitch1 BldPitch2 BldPitch3 WindHubVelX WindHubVelY WindHubVelZ\n\
         (s) (kW) (kN-m) (rpm) (-) (-) (deg) (deg) (deg) (m/s) (m/s) (m/s)\n",
    );
    for i in 0..rows {
        content.push_str(&format!(
            "{:.3} {power} {} 1200 0.45 0.7 2.5 2.5 2.5 {} {} {}\n",
            i as f64 * 0.05,
            power / 10.0,
            wind.0,
            wind.1,
            wind.2
        ));
    }
    content
}
