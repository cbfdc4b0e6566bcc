/// Ordinal of a resolution label; higher is better, unknown labels rank -1.
pub fn resolution_rank(resolution: &str) -> i32 {
    match resolution.to_uppercase().as_str() {
        "8K" | "4320P" => 6,
        "4K" | "2160P" => 5,
        "2K" | "1440P" => 4,
        "1080P" => 3,
        "720P" => 2,
        "480P" => 1,
        "360P" => 0,
        _ => -1,
    }
}
