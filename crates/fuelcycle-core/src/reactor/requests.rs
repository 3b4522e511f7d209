use super::{LOG_TARGET, Reactor};
use crate::exchange::{Request, RequestGroup};
use crate::facility::{FacilityError, PhaseContext};
use crate::fixed::Fixed64;
use crate::recipe::Composition;
use std::sync::Arc;
use tracing::debug;

impl Reactor {
    /// One group per missing assembly, each offering every fuel path as a
    /// mutually exclusive alternative.
    pub(super) fn build_requests(
        &mut self,
        ctx: &mut PhaseContext<'_>,
    ) -> Result<Vec<RequestGroup>, FacilityError> {
        let missing = self.buffers.missing_assemblies();
        if missing == 0 {
            return Ok(Vec::new());
        }

        let offers = self
            .tracker
            .paths()
            .iter()
            .map(|p| -> Result<_, FacilityError> {
                let target = ctx.recipes.recipe(&p.in_recipe)?;
                Ok((p.in_commodity.clone(), p.preference.unwrap_or_default(), target))
            })
            .collect::<Result<Vec<(String, Fixed64, Arc<Composition>)>, _>>()?;

        let mut groups = Vec::with_capacity(missing);
        for _ in 0..missing {
            let mut group = RequestGroup::new();
            let mut ids = Vec::with_capacity(offers.len());
            for (commodity, preference, target) in &offers {
                let id = self.next_request_id();
                ids.push(group.add_request(Request {
                    id,
                    commodity: commodity.clone(),
                    quantity: self.assem_size,
                    target: Arc::clone(target),
                    preference: *preference,
                    exclusive: true,
                }));
            }
            group.add_mutual(ids);
            groups.push(group);
        }

        debug!(
            target: LOG_TARGET,
            facility = self.id.0,
            tick = ctx.tick,
            assemblies = missing,
            paths = offers.len(),
            "requesting fresh fuel"
        );
        Ok(groups)
    }
}
