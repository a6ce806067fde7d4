use super::adaptive::MIN_CLUSTER_DENSITY;
use super::Drone;
use std::collections::HashMap;

/// Two agents' distances to a shared cluster must differ by at least this
/// factor before distance alone settles ownership; near-ties fall back to
/// the id order so ownership cannot oscillate between exchanges.
const OWNERSHIP_MARGIN: f64 = 0.7;

/// One swarm synchronisation exchange: refresh every adaptive drone's peer
/// table, reconcile cluster knowledge pairwise, and rebalance sector
/// preferences. Each pair is processed as one atomic exchange; drones only
/// ever see read-only snapshots of each other.
pub fn sync(drones: &mut [Drone]) {
    update_peer_tables(drones);
    for i in 0..drones.len() {
        for j in (i + 1)..drones.len() {
            let (left, right) = drones.split_at_mut(j);
            reconcile_pair(&mut left[i], &mut right[0]);
        }
    }
    rebalance_sectors(drones);
}

fn update_peer_tables(drones: &mut [Drone]) {
    let positions: Vec<(u32, [f64; 2], bool)> = drones
        .iter()
        .map(|d| (d.id(), d.position(), d.adaptive().is_some()))
        .collect();
    for drone in drones.iter_mut() {
        let own_id = drone.id();
        if let Some(state) = drone.adaptive_mut() {
            let peers: HashMap<u32, [f64; 2]> = positions
                .iter()
                .filter(|(id, _, adaptive)| *adaptive && *id != own_id)
                .map(|(id, position, _)| (*id, *position))
                .collect();
            state.set_peers(peers);
        }
    }
}

/// Reconcile cluster registries between two drones.
///
/// Coincident clusters get exactly one owner; clusters only one side knows
/// are copied over (unassigned, above the significance threshold) so the
/// next exchange can resolve them with full knowledge.
fn reconcile_pair(a: &mut Drone, b: &mut Drone) {
    let (a_id, a_pos) = (a.id(), a.position());
    let (b_id, b_pos) = (b.id(), b.position());
    let (Some(state_a), Some(state_b)) = (a.adaptive_mut(), b.adaptive_mut()) else {
        return;
    };

    let snapshot_a = state_a.snapshot();
    let snapshot_b = state_b.snapshot();

    for (id_a, track) in &snapshot_a {
        match state_b.coincident_cluster(track.center) {
            Some(id_b) => {
                let dist_a = distance(a_pos, track.center);
                let dist_b = distance(b_pos, track.center);
                let a_owns = if dist_b < dist_a * OWNERSHIP_MARGIN {
                    false
                } else if dist_a < dist_b * OWNERSHIP_MARGIN {
                    true
                } else {
                    a_id < b_id
                };
                if a_owns {
                    state_a.assign(*id_a);
                    state_b.unassign(id_b);
                } else {
                    state_b.assign(id_b);
                    state_a.unassign(*id_a);
                }
            }
            None => {
                if track.density > MIN_CLUSTER_DENSITY {
                    state_b.inject(*track);
                }
            }
        }
    }

    for (_, track) in &snapshot_b {
        if state_a.coincident_cluster(track.center).is_none()
            && track.density > MIN_CLUSTER_DENSITY
        {
            state_a.inject(*track);
        }
    }
}

/// When two drones prefer the same quadrant, the higher id is moved to the
/// least crowded one (lowest index on ties, deterministically).
fn rebalance_sectors(drones: &mut [Drone]) {
    let mut order: Vec<usize> = (0..drones.len())
        .filter(|&i| drones[i].adaptive().is_some())
        .collect();
    order.sort_by_key(|&i| drones[i].id());

    for &idx in &order {
        let id = drones[idx].id();
        let sector = match drones[idx].adaptive() {
            Some(state) => state.sector(),
            None => continue,
        };
        let contested = drones.iter().any(|other| {
            other.id() < id
                && other
                    .adaptive()
                    .is_some_and(|state| state.sector() == sector)
        });
        if !contested {
            continue;
        }

        let mut counts = [0usize; 4];
        for drone in drones.iter() {
            if let Some(state) = drone.adaptive() {
                counts[state.sector() as usize] += 1;
            }
        }
        let new_sector = (0u8..4)
            .filter(|&s| s != sector)
            .min_by_key(|&s| counts[s as usize]);
        if let (Some(new_sector), Some(state)) = (new_sector, drones[idx].adaptive_mut()) {
            state.set_sector(new_sector);
        }
    }
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drone::adaptive::{AdaptiveState, ClusterTrack};
    use crate::drone::{Bounds, Drone, FlightPattern};

    fn adaptive_drone(id: u32, position: [f64; 2], sector: u8) -> Drone {
        Drone::new(
            id,
            position,
            0.0,
            0.3,
            Bounds::of_map(100.0, 100.0),
            FlightPattern::Adaptive(AdaptiveState::new(2.0, 1.0, sector, id as u64)),
        )
    }

    fn seed_claimed_track(drone: &mut Drone, center: [f64; 2]) -> u64 {
        let state = drone.adaptive_mut().unwrap();
        let id = state.inject(ClusterTrack {
            center,
            density: 0.95,
            age: 0,
        });
        state.assign(id);
        id
    }

    #[test]
    fn clearly_closer_drone_wins_the_cluster() {
        let center = [50.0, 50.0];
        let mut drones = vec![
            adaptive_drone(0, [48.0, 50.0], 0),
            adaptive_drone(1, [90.0, 50.0], 1),
        ];
        let id_a = seed_claimed_track(&mut drones[0], center);
        let id_b = seed_claimed_track(&mut drones[1], center);

        sync(&mut drones);

        assert!(drones[0].adaptive().unwrap().is_assigned(id_a));
        assert!(!drones[1].adaptive().unwrap().is_assigned(id_b));
    }

    #[test]
    fn near_tie_breaks_by_lower_id_and_never_oscillates() {
        let center = [50.0, 50.0];
        let mut drones = vec![
            adaptive_drone(0, [45.0, 50.0], 0),
            adaptive_drone(1, [55.0, 50.0], 1),
        ];
        let id_a = seed_claimed_track(&mut drones[0], center);
        let id_b = seed_claimed_track(&mut drones[1], center);

        for _ in 0..5 {
            sync(&mut drones);
            assert!(drones[0].adaptive().unwrap().is_assigned(id_a));
            assert!(!drones[1].adaptive().unwrap().is_assigned(id_b));
        }
    }

    #[test]
    fn resolution_does_not_depend_on_exchange_order() {
        let center = [50.0, 50.0];
        let build = |flipped: bool| {
            let mut drones = vec![
                adaptive_drone(0, [45.0, 50.0], 0),
                adaptive_drone(1, [55.0, 50.0], 1),
            ];
            if flipped {
                drones.reverse();
            }
            for drone in drones.iter_mut() {
                seed_claimed_track(drone, center);
            }
            sync(&mut drones);
            drones.sort_by_key(|d| d.id());
            drones
                .iter()
                .map(|d| {
                    let state = d.adaptive().unwrap();
                    state.snapshot().iter().any(|(id, _)| state.is_assigned(*id))
                })
                .collect::<Vec<bool>>()
        };
        assert_eq!(build(false), build(true));
    }

    #[test]
    fn significant_clusters_propagate_to_uninformed_peers() {
        let mut drones = vec![
            adaptive_drone(0, [10.0, 10.0], 0),
            adaptive_drone(1, [90.0, 90.0], 1),
        ];
        seed_claimed_track(&mut drones[0], [12.0, 12.0]);

        sync(&mut drones);

        let peer = drones[1].adaptive().unwrap();
        assert_eq!(peer.tracked_clusters(), 1);
        // Learned clusters arrive unassigned; the discoverer keeps them.
        assert!(peer.snapshot().iter().all(|(id, _)| !peer.is_assigned(*id)));
    }

    #[test]
    fn weak_tracks_are_not_shared() {
        let mut drones = vec![
            adaptive_drone(0, [10.0, 10.0], 0),
            adaptive_drone(1, [90.0, 90.0], 1),
        ];
        let state = drones[0].adaptive_mut().unwrap();
        let id = state.inject(ClusterTrack {
            center: [12.0, 12.0],
            density: 0.4,
            age: 0,
        });
        state.assign(id);

        sync(&mut drones);

        assert_eq!(drones[1].adaptive().unwrap().tracked_clusters(), 0);
    }

    #[test]
    fn sector_conflicts_resolve_toward_the_least_crowded_quadrant() {
        let mut drones = vec![
            adaptive_drone(0, [10.0, 10.0], 2),
            adaptive_drone(1, [90.0, 90.0], 2),
            adaptive_drone(2, [50.0, 50.0], 0),
        ];

        sync(&mut drones);

        let sectors: Vec<u8> = drones
            .iter()
            .map(|d| d.adaptive().unwrap().sector())
            .collect();
        // Lower id keeps its quadrant; the contender moves off it.
        assert_eq!(sectors[0], 2);
        assert_ne!(sectors[1], 2);
        // All three end up spread over distinct quadrants.
        assert_eq!(
            {
                let mut s = sectors.clone();
                s.sort_unstable();
                s.dedup();
                s.len()
            },
            3
        );
    }
}
