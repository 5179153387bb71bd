mod tag_name;
mod text_type;

pub use self::tag_name::TagName;
pub(crate) use self::tag_name::{
    causes_foreign_content_exit, is_html_integration_point_in_svg,
    is_text_integration_point_in_math_ml,
};
pub use self::text_type::TextType;
