//! Sessions
//!
//! A session is one task run, named by a readable slug such as
//! `quantum-cyborg-1234`. Running sessions are tracked in a
//! [`SessionRegistry`] so `/stop` can reach them.

pub mod registry;

pub use registry::{SessionGuard, SessionRegistry};

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "quantum", "neon", "stellar", "galactic", "cyber", "holographic", "plasma", "nano", "hyper",
    "virtual", "cosmic", "interstellar", "lunar", "solar", "astro", "exo", "alien", "robotic",
    "synthetic", "digital", "futuristic", "parallel", "extraterrestrial", "transdimensional",
    "biomechanical", "cybernetic", "hologram", "metaphysical", "subatomic", "tachyon", "warp",
    "xeno", "zenith", "zerogravity", "antimatter", "darkmatter", "neural", "photon",
    "singularity", "space-time", "telepathic", "timetravel", "ultra", "virtualreality",
    "wormhole",
];

const NOUNS: &[&str] = &[
    "cyborg", "android", "drone", "mech", "robot", "alien", "spaceship", "starship", "satellite",
    "probe", "astronaut", "cosmonaut", "galaxy", "nebula", "comet", "asteroid", "planet", "moon",
    "star", "quasar", "black-hole", "wormhole", "singularity", "dimension", "universe",
    "multiverse", "matrix", "simulation", "hologram", "avatar", "clone", "replicant",
    "cyberspace", "nanobot", "biobot", "exosuit", "spacesuit", "terraformer", "teleporter",
    "warpdrive", "hyperdrive", "stasis", "cryosleep", "fusion", "fission", "antigravity",
    "darkenergy", "neutrino", "tachyon", "photon",
];

/// `{adjective}-{noun}-{1000..=9999}`
pub fn generate_session_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("quantum");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("cyborg");
    let number: u16 = rng.gen_range(1000..=9999);
    format!("{}-{}-{}", adjective, noun, number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_name_shape() {
        let name = generate_session_name();
        let (rest, number) = name.rsplit_once('-').unwrap();
        let number: u16 = number.parse().unwrap();
        assert!((1000..=9999).contains(&number));
        assert!(ADJECTIVES
            .iter()
            .any(|a| rest.starts_with(a) && NOUNS.contains(&&rest[a.len() + 1..])));
    }
}
