use contracts::Club;

use super::Arena;

impl Arena {
    /// Ranking projection over current club aggregates: territories held
    /// descending, then total power descending. Recomputed on every call,
    /// never cached.
    pub fn leaderboard(&self, limit: usize) -> Vec<Club> {
        let mut ranked = self.clubs.values().cloned().collect::<Vec<_>>();
        ranked.sort_by(|a, b| {
            b.territories_controlled
                .cmp(&a.territories_controlled)
                .then_with(|| b.total_power.cmp(&a.total_power))
                .then_with(|| a.club_id.cmp(&b.club_id))
        });
        ranked.truncate(limit);
        ranked
    }
}
