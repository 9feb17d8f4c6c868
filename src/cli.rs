use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "dota_replays")]
#[command(about = "Dota replay downloader", long_about = None)]
pub struct Cli {
    /// OpenDota player account id
    pub player_id: u64,

    /// With --refresh, re-fetch the N most recent matches; -1 for all
    #[arg(
        short = 'n',
        long = "recent-matches",
        default_value_t = 20,
        allow_negative_numbers = true
    )]
    pub recent_matches: i64,

    /// Overwrite cached details instead of fetching only missing ones
    #[arg(short, long)]
    pub refresh: bool,

    /// Directory holding session files and replay directories
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(vec!["dota_replays", "117718885"]).unwrap();
        assert_eq!(cli.player_id, 117718885);
        assert_eq!(cli.recent_matches, 20);
        assert!(!cli.refresh);
        assert_eq!(cli.data_dir, PathBuf::from("."));
    }

    #[test]
    fn test_refresh_all() {
        let cli =
            Cli::try_parse_from(vec!["dota_replays", "117718885", "-r", "-n", "-1"]).unwrap();
        assert!(cli.refresh);
        assert_eq!(cli.recent_matches, -1);
    }

    #[test]
    fn test_player_id_required() {
        assert!(Cli::try_parse_from(vec!["dota_replays"]).is_err());
    }
}
