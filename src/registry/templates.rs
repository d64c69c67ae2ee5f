//! Template text for every supported table.
//!
//! Import templates are argument lists for `sqoop`; the program name is
//! prepended by the engine runner. Normalize templates are bare `SELECT`
//! statements; the materializing `CREATE TABLE` wrapper lives in
//! [`crate::normalize`].

pub(crate) const PAGE_IMPORT: &str = r#"import \
  --connect jdbc:mysql://{connect_host}/{source_db} \
  --verbose \
  --target-dir {target_dir} \
  --delete-target-dir \
  --username {username} \
  --password-file {password_file} \
  --split-by page_id \
  --hive-import \
  --hive-database {namespace} \
  --create-hive-table \
  --hive-table {result_table} \
  --hive-delims-replacement ' ' \
  --query '
SELECT
  page_id,
  CAST(page_title AS CHAR(255) CHARSET utf8) AS page_title,
  page_is_redirect,
  page_namespace
FROM page
WHERE $CONDITIONS
'"#;

// The raw import already carries canonical identity; this is a copy.
pub(crate) const PAGE_NORMALIZE: &str = r#"SELECT
  page_id,
  page_namespace,
  page_is_redirect,
  page_title
FROM
  {namespace}.{raw_table}"#;

pub(crate) const REDIRECT_IMPORT: &str = r#"import \
  --connect jdbc:mysql://{connect_host}/{source_db} \
  --verbose \
  --target-dir {target_dir} \
  --delete-target-dir \
  --username {username} \
  --password-file {password_file} \
  --split-by rd_from \
  --hive-import \
  --hive-database {namespace} \
  --create-hive-table \
  --hive-table {result_table} \
  --hive-delims-replacement ' ' \
  --query '
SELECT
  rd_from,
  CAST(rd_title AS CHAR(255) CHARSET utf8) AS rd_title,
  rd_namespace
FROM redirect
WHERE $CONDITIONS
'"#;

pub(crate) const REDIRECT_NORMALIZE: &str = r#"SELECT
  pfrom.page_id AS rd_from_page_id,
  pfrom.page_namespace AS rd_from_page_namespace,
  pfrom.page_is_redirect AS rd_from_page_is_redirect,
  pfrom.page_title AS rd_from_page_title,
  pto.page_id AS rd_to_page_id,
  pto.page_namespace AS rd_to_page_namespace,
  pto.page_is_redirect AS rd_to_page_is_redirect,
  pto.page_title AS rd_to_page_title
FROM
  {namespace}.{raw_table} a
  JOIN {namespace}.{page_table} pfrom ON (a.rd_from = pfrom.page_id)
  JOIN {namespace}.{page_table} pto ON (a.rd_title = pto.page_title AND pto.page_namespace = a.rd_namespace)"#;

pub(crate) const REVISION_IMPORT: &str = r#"import \
  --connect jdbc:mysql://{connect_host}/{source_db} \
  --verbose \
  --target-dir {target_dir} \
  --delete-target-dir \
  --username {username} \
  --password-file {password_file} \
  --split-by rev_parent_id \
  --hive-import \
  --hive-database {namespace} \
  --create-hive-table \
  --hive-table {result_table} \
  --hive-delims-replacement ' ' \
  --query '
SELECT
  rev_page,
  rev_user,
  CAST(rev_user_text AS CHAR(255) CHARSET utf8) AS rev_user_text,
  rev_minor_edit,
  rev_deleted,
  rev_len,
  rev_parent_id
FROM revision
WHERE $CONDITIONS
'"#;

pub(crate) const REVISION_NORMALIZE: &str = r#"SELECT
  a.*,
  b.page_id AS rev_page_id,
  b.page_namespace AS rev_page_namespace,
  b.page_is_redirect AS rev_page_is_redirect,
  b.page_title AS rev_page_title
FROM
  {namespace}.{raw_table} a JOIN {namespace}.{page_table} b ON (a.rev_page = b.page_id)"#;

pub(crate) const PAGELINKS_IMPORT: &str = r#"import \
  --connect jdbc:mysql://{connect_host}/{source_db} \
  --verbose \
  --target-dir {target_dir} \
  --delete-target-dir \
  --username {username} \
  --password-file {password_file} \
  --split-by pl_from \
  --hive-import \
  --hive-database {namespace} \
  --create-hive-table \
  --hive-table {result_table} \
  --hive-delims-replacement ' ' \
  --query '
SELECT
  pl_from,
  CAST(pl_title AS CHAR(255) CHARSET utf8) AS pl_title,
  pl_from_namespace,
  pl_namespace
FROM pagelinks
WHERE $CONDITIONS
'"#;

// Redirects are not resolved: a link to a redirect page points at the
// redirect page itself.
pub(crate) const PAGELINKS_NORMALIZE: &str = r#"SELECT
  pfrom.page_id AS pl_from_page_id,
  pfrom.page_namespace AS pl_from_page_namespace,
  pfrom.page_is_redirect AS pl_from_page_is_redirect,
  pfrom.page_title AS pl_from_page_title,
  pto.page_id AS pl_to_page_id,
  pto.page_namespace AS pl_to_page_namespace,
  pto.page_is_redirect AS pl_to_page_is_redirect,
  pto.page_title AS pl_to_page_title
FROM
  {namespace}.{raw_table} a
  JOIN {namespace}.{page_table} pfrom ON (a.pl_from = pfrom.page_id)
  JOIN {namespace}.{page_table} pto ON (a.pl_title = pto.page_title AND pto.page_namespace = a.pl_namespace)"#;

pub(crate) const PAGE_PROPS_IMPORT: &str = r#"import \
  --connect jdbc:mysql://{connect_host}/{source_db} \
  --verbose \
  --target-dir {target_dir} \
  --delete-target-dir \
  --username {username} \
  --password-file {password_file} \
  --split-by pp_page \
  --hive-import \
  --hive-database {namespace} \
  --create-hive-table \
  --hive-table {result_table} \
  --hive-delims-replacement ' ' \
  --query '
SELECT
  pp_page,
  CAST(pp_propname AS CHAR(60) CHARSET utf8) AS pp_propname,
  CAST(pp_value AS CHAR(256) CHARSET utf8) AS pp_value
FROM page_props
WHERE $CONDITIONS
'"#;

pub(crate) const PAGE_PROPS_NORMALIZE: &str = r#"SELECT
  page_id,
  page_namespace,
  page_is_redirect,
  page_title,
  pp_propname AS propname,
  pp_value AS value
FROM
  {namespace}.{raw_table} a JOIN {namespace}.{page_table} b ON (a.pp_page = b.page_id)"#;
