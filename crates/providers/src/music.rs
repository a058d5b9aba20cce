//! Static background-music table for composites.

use serde::Serialize;

/// Track selected when the user has not chosen one.
pub const DEFAULT_MUSIC_TRACK: &str = "hype";

/// A background-music track the composite provider can mix in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MusicTrack {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(skip)]
    pub url: &'static str,
}

pub static MUSIC_TRACKS: [MusicTrack; 5] = [
    MusicTrack {
        id: "hype",
        name: "Hype",
        url: "https://shotstack-assets.s3-ap-southeast-2.amazonaws.com/music/unminus/lit.mp3",
    },
    MusicTrack {
        id: "chill",
        name: "Chill",
        url: "https://shotstack-assets.s3-ap-southeast-2.amazonaws.com/music/unminus/palmtrees.mp3",
    },
    MusicTrack {
        id: "motivational",
        name: "Motivational",
        url: "https://shotstack-assets.s3-ap-southeast-2.amazonaws.com/music/unminus/sugar.mp3",
    },
    MusicTrack {
        id: "corporate",
        name: "Corporate",
        url: "https://shotstack-assets.s3-ap-southeast-2.amazonaws.com/music/unminus/dreams.mp3",
    },
    MusicTrack {
        id: "dramatic",
        name: "Dramatic",
        url: "https://shotstack-assets.s3-ap-southeast-2.amazonaws.com/music/unminus/ambition.mp3",
    },
];

/// Look up a track by id.
pub fn find_track(id: &str) -> Option<&'static MusicTrack> {
    MUSIC_TRACKS.iter().find(|t| t.id == id)
}

/// All tracks, in display order.
pub fn list_music_tracks() -> &'static [MusicTrack] {
    &MUSIC_TRACKS
}

/// Source URL for `id`, falling back to the default track.
pub fn track_url(id: &str) -> &'static str {
    find_track(id)
        .or_else(|| find_track(DEFAULT_MUSIC_TRACK))
        .map(|t| t.url)
        .unwrap_or(MUSIC_TRACKS[0].url)
}
