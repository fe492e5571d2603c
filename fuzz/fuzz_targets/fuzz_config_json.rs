#![no_main]

use libfuzzer_sys::fuzz_target;
use quicklaunch::config::Config;

fuzz_target!(|data: &[u8]| {
    // Arbitrary documents must either fail to parse or normalize into a
    // catalog with unique ids and dense order
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(mut config) = serde_json::from_str::<Config>(s)
    {
        config.normalize();
        for (index, tile) in config.tiles.iter().enumerate() {
            assert_eq!(tile.order, index);
        }
        let mut ids: Vec<&str> = config.tiles.iter().map(|t| t.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), config.tiles.len());
        assert!(config.settings.recent_folders_limit >= 1);
    }
});
