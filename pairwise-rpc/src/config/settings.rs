use prople_pairwise_core::types::{AgencyInfo, Settings};

use crate::common::helpers;
use crate::common::types::CommonError;

use super::Config;

/// Turns a validated [`Config`] into the core [`Settings`] shared by every usecase
pub fn build_settings(config: &Config) -> Result<Settings, CommonError> {
    helpers::validate(config.clone())?;

    let agent = config.agent();
    let agency = config.agency();

    let settings = Settings::new(agent.get_protocol(), agent.get_label())
        .with_public_did(agent.get_public_did())
        .with_logo_url(agent.get_logo_url())
        .with_agency(AgencyInfo::new(
            agency.get_did(),
            agency.get_verkey(),
            agency.get_endpoint(),
        ))
        .with_connect_defaults(config.connection().to_connect_options());

    Ok(settings)
}
