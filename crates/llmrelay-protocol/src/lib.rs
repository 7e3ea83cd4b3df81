mod group;
mod model_list;
mod redirect;

pub use group::{ChannelType, EffectiveConfig, Group, UpstreamDefinition};
pub use model_list::{GeminiModelEntry, GeminiModelList, OpenAiModelEntry, OpenAiModelList};
pub use redirect::{RedirectRuleSetV1, RedirectRuleSetV2, RedirectRuleV2Entry, RedirectTarget};
