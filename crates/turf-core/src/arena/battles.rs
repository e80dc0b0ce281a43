use contracts::{BattleOutcome, BattleRecord, Defender, DomainError, SCHEMA_VERSION_V1};

use super::Arena;

impl Arena {
    /// Resolve a challenge against a controlled territory. The territory,
    /// both clubs' counters, and the appended battle record all land in the
    /// same drain window, so the transfer commits as one unit.
    pub fn challenge(
        &mut self,
        user_id: &str,
        territory_id: &str,
    ) -> Result<BattleOutcome, DomainError> {
        let attacker = self.directory.require(user_id)?.clone();
        let membership = attacker.club.as_ref().ok_or_else(|| {
            DomainError::forbidden(
                "must belong to a club to challenge a territory",
                Some(format!("user_id={user_id}")),
            )
        })?;
        let attacker_club_id = membership.club_id.clone();

        let territory = self.territories.get(territory_id).ok_or_else(|| {
            DomainError::not_found(
                "territory does not exist",
                Some(format!("territory_id={territory_id}")),
            )
        })?;
        let defender_club_id = territory.controlling_club_id.clone().ok_or_else(|| {
            DomainError::invalid_state(
                "territory is unclaimed; claim it instead of challenging",
                Some(format!("territory_id={territory_id}")),
            )
        })?;
        if defender_club_id == attacker_club_id {
            return Err(DomainError::invalid_state(
                "your club already controls this territory",
                Some(format!("territory_id={territory_id}")),
            ));
        }

        let attacker_club = self.clubs.get(&attacker_club_id).ok_or_else(|| {
            DomainError::internal(
                "membership references a missing club",
                Some(format!("club_id={attacker_club_id}")),
            )
        })?;
        let attacker_club_name = attacker_club.name.clone();
        let attacker_club_color = attacker_club.color.clone();
        let defender_club_name = self
            .clubs
            .get(&defender_club_id)
            .map(|club| club.name.clone())
            .ok_or_else(|| {
                DomainError::internal(
                    "territory references a missing club",
                    Some(format!("club_id={defender_club_id}")),
                )
            })?;

        let defender_strength = territory.control_strength;
        let territory_name = territory.name.clone();

        let sequence = self.next_battle_sequence();
        let rolls = self
            .rules()
            .resolve(sequence, attacker.level, defender_strength);

        self.touch_territory(territory_id);
        self.touch_club(&attacker_club_id);
        self.touch_club(&defender_club_id);

        let territory = self.territories.get_mut(territory_id).ok_or_else(|| {
            DomainError::internal("territory vanished mid-operation", None)
        })?;
        territory.total_battles += 1;

        let message = if rolls.victory {
            territory.controlling_club_id = Some(attacker_club_id.clone());
            territory.controlling_club_name = Some(attacker_club_name.clone());
            territory.controlling_club_color = Some(attacker_club_color);
            territory.defenders = vec![Defender {
                user_id: user_id.to_string(),
                username: attacker.username.clone(),
                level: attacker.level,
            }];
            territory.control_strength = attacker.level;

            if let Some(club) = self.clubs.get_mut(&attacker_club_id) {
                club.territories_controlled += 1;
                club.wins += 1;
            }
            if let Some(club) = self.clubs.get_mut(&defender_club_id) {
                club.territories_controlled = club.territories_controlled.saturating_sub(1);
                club.losses += 1;
            }

            format!("{attacker_club_name} captured {territory_name} from {defender_club_name}")
        } else {
            if let Some(club) = self.clubs.get_mut(&attacker_club_id) {
                club.losses += 1;
            }
            if let Some(club) = self.clubs.get_mut(&defender_club_id) {
                club.wins += 1;
            }

            format!("{defender_club_name} held {territory_name}")
        };

        let battle_id = format!("battle:{sequence:06}");
        self.battle_log.push(BattleRecord {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            battle_id: battle_id.clone(),
            sequence,
            territory_id: territory_id.to_string(),
            attacker_club_id,
            attacker_user_id: user_id.to_string(),
            defender_club_id,
            attacker_power: attacker.level,
            defender_strength,
            victory: rolls.victory,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        });

        Ok(BattleOutcome {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            battle_id,
            victory: rolls.victory,
            attacker_roll: rolls.attacker_roll,
            defense_roll: rolls.defense_roll,
            message,
        })
    }

    /// Newest-first audit slice of the battle log for one territory.
    pub fn battles_for_territory(&self, territory_id: &str) -> Vec<BattleRecord> {
        let mut records = self
            .battle_log
            .iter()
            .filter(|record| record.territory_id == territory_id)
            .cloned()
            .collect::<Vec<_>>();
        records.reverse();
        records
    }
}
