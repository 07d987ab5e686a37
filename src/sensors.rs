// Temperature sensor selection.

use std::collections::{BTreeMap, BTreeSet};

use crate::sysinfo_repo::ComponentReading;
use crate::units::two_decimals;

/// Sensor label → °C for every sensor with a live, nonzero reading.
///
/// With an allow-list only listed labels are kept. When several sensors share a
/// label the first one listed wins.
pub fn select_temperatures(
    components: &[ComponentReading],
    allowlist: Option<&BTreeSet<String>>,
) -> BTreeMap<String, f64> {
    let mut temperatures = BTreeMap::new();
    for c in components {
        let Some(temp) = c.temperature.map(f64::from) else {
            continue;
        };
        if !temp.is_finite() || temp == 0.0 {
            continue;
        }
        if allowlist.is_some_and(|names| !names.contains(&c.label)) {
            continue;
        }
        temperatures
            .entry(c.label.clone())
            .or_insert_with(|| two_decimals(temp));
    }
    temperatures
}
