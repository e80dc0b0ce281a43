use contracts::{
    Defender, DomainError, GeoBounds, Territory, TerritoryDescriptor, SCHEMA_VERSION_V1,
};

use super::Arena;

impl Arena {
    /// Sync a territory from the external place-lookup service. Descriptive
    /// fields are overwritten; control state is never touched by a sync.
    pub fn register_territory(
        &mut self,
        descriptor: &TerritoryDescriptor,
    ) -> Result<Territory, DomainError> {
        let territory_id = descriptor.territory_id.clone();
        if territory_id.trim().is_empty() {
            return Err(DomainError::invalid_query(
                "territory_id must not be blank",
                None,
            ));
        }

        if self.territories.contains_key(&territory_id) {
            self.touch_territory(&territory_id);
            let territory = self
                .territories
                .get_mut(&territory_id)
                .ok_or_else(|| territory_not_found(&territory_id))?;
            territory.name = descriptor.name.clone();
            territory.address = descriptor.address.clone();
            territory.latitude = descriptor.latitude;
            territory.longitude = descriptor.longitude;
            territory.rating = descriptor.rating;
            return Ok(territory.clone());
        }

        let territory = Territory {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            territory_id: territory_id.clone(),
            name: descriptor.name.clone(),
            address: descriptor.address.clone(),
            latitude: descriptor.latitude,
            longitude: descriptor.longitude,
            rating: descriptor.rating,
            controlling_club_id: None,
            controlling_club_name: None,
            controlling_club_color: None,
            defenders: Vec::new(),
            control_strength: 0,
            total_battles: 0,
            version: 1,
        };
        self.territories
            .insert(territory_id.clone(), territory.clone());
        self.mark_territory_created(&territory_id);
        Ok(territory)
    }

    pub fn claim(&mut self, user_id: &str, territory_id: &str) -> Result<String, DomainError> {
        let user = self.directory.require(user_id)?.clone();
        let membership = user.club.as_ref().ok_or_else(|| {
            DomainError::forbidden(
                "must belong to a club to claim a territory",
                Some(format!("user_id={user_id}")),
            )
        })?;
        let territory = self
            .territories
            .get(territory_id)
            .ok_or_else(|| territory_not_found(territory_id))?;
        if let Some(holder) = &territory.controlling_club_id {
            return Err(DomainError::conflict(
                "territory is already controlled",
                Some(format!("controlling_club_id={holder}")),
            ));
        }

        let club_id = membership.club_id.clone();
        let club = self.clubs.get(&club_id).ok_or_else(|| {
            DomainError::internal(
                "membership references a missing club",
                Some(format!("club_id={club_id}")),
            )
        })?;
        let club_name = club.name.clone();
        let club_color = club.color.clone();

        self.touch_territory(territory_id);
        self.touch_club(&club_id);

        let territory = self
            .territories
            .get_mut(territory_id)
            .ok_or_else(|| territory_not_found(territory_id))?;
        territory.controlling_club_id = Some(club_id.clone());
        territory.controlling_club_name = Some(club_name.clone());
        territory.controlling_club_color = Some(club_color);
        territory.defenders = vec![Defender {
            user_id: user_id.to_string(),
            username: user.username.clone(),
            level: user.level,
        }];
        territory.control_strength = user.level;
        let territory_name = territory.name.clone();

        if let Some(club) = self.clubs.get_mut(&club_id) {
            club.territories_controlled += 1;
        }

        Ok(format!("{club_name} claimed {territory_name}"))
    }

    pub fn add_defender(
        &mut self,
        user_id: &str,
        territory_id: &str,
    ) -> Result<String, DomainError> {
        let user = self.directory.require(user_id)?.clone();
        let territory = self
            .territories
            .get(territory_id)
            .ok_or_else(|| territory_not_found(territory_id))?;

        let controls = user
            .club
            .as_ref()
            .map(|membership| Some(&membership.club_id) == territory.controlling_club_id.as_ref())
            .unwrap_or(false);
        if !controls {
            return Err(DomainError::forbidden(
                "your club does not control this territory",
                Some(format!("territory_id={territory_id}")),
            ));
        }
        if territory.has_defender(user_id) {
            return Err(DomainError::conflict(
                "user is already defending this territory",
                Some(format!("user_id={user_id}")),
            ));
        }
        if territory.defenders.len() >= self.config.max_defenders {
            return Err(DomainError::capacity(
                "defender roster is full",
                Some(format!("max_defenders={}", self.config.max_defenders)),
            ));
        }

        self.touch_territory(territory_id);
        let territory = self
            .territories
            .get_mut(territory_id)
            .ok_or_else(|| territory_not_found(territory_id))?;
        territory.defenders.push(Defender {
            user_id: user_id.to_string(),
            username: user.username.clone(),
            level: user.level,
        });
        territory.control_strength = territory.recomputed_strength();

        Ok(format!("now defending {}", territory.name))
    }

    pub fn get_territory(&self, territory_id: &str) -> Result<&Territory, DomainError> {
        self.territories
            .get(territory_id)
            .ok_or_else(|| territory_not_found(territory_id))
    }

    pub fn list_territories(&self, bounds: Option<&GeoBounds>, limit: usize) -> Vec<Territory> {
        self.territories
            .values()
            .filter(|territory| {
                bounds
                    .map(|bounds| bounds.contains(territory.latitude, territory.longitude))
                    .unwrap_or(true)
            })
            .take(limit)
            .cloned()
            .collect()
    }
}

fn territory_not_found(territory_id: &str) -> DomainError {
    DomainError::not_found(
        "territory does not exist",
        Some(format!("territory_id={territory_id}")),
    )
}
